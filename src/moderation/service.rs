//! The moderation pipeline
//!
//! Every classified event goes through the same steps: resolve the guild's
//! configuration, drop disabled or exempt events, record the violation in the
//! tracker, evaluate the category policy and, when it fires, punish and
//! remediate through the `Enforcer`.

use super::{
    ActorProfile, EnforcementDecision, Exemption, ScopeFacts, TrackerSettings, ViolationCategory,
    ViolationKey, ViolationTracker, evaluate,
};
use crate::ENFORCEMENT_TARGET;
use crate::enforcement::{Enforcer, Remediation};
use crate::store::ConfigStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One classified occurrence of monitored activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationEvent {
    pub scope_id: u64,
    pub category: ViolationCategory,
    pub actor_id: u64,
    pub timestamp: DateTime<Utc>,
    /// Violations carried by this event, e.g. one per mention in a message
    pub occurrences: usize,
}

impl ViolationEvent {
    #[must_use]
    pub fn new(
        scope_id: u64,
        category: ViolationCategory,
        actor_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            scope_id,
            category,
            actor_id,
            timestamp,
            occurrences: 1,
        }
    }

    #[must_use]
    pub fn with_occurrences(mut self, occurrences: usize) -> Self {
        self.occurrences = occurrences;
        self
    }

    fn key(&self) -> ViolationKey {
        ViolationKey::new(self.scope_id, self.category, self.actor_id)
    }
}

/// What the pipeline did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Configuration could not be read, event dropped
    ConfigUnavailable,
    /// Family switch or category policy is off
    Disabled,
    Exempt(Exemption),
    /// Recorded, below threshold
    Recorded { count: usize },
    Enforced {
        decision: EnforcementDecision,
        count: usize,
        remediated: Option<bool>,
    },
    EnforcementFailed {
        decision: EnforcementDecision,
        count: usize,
        remediated: Option<bool>,
    },
}

impl Outcome {
    /// Whether the policy fired, regardless of punishment success
    #[must_use]
    pub fn fired(&self) -> bool {
        matches!(self, Self::Enforced { .. } | Self::EnforcementFailed { .. })
    }
}

/// Shared tracker plus policy evaluation plus enforcement
#[derive(Clone)]
pub struct ModerationService {
    tracker: ViolationTracker,
    settings: Arc<TrackerSettings>,
    store: Arc<dyn ConfigStore>,
    enforcer: Arc<dyn Enforcer>,
}

impl std::fmt::Debug for ModerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationService")
            .field("tracker", &self.tracker)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ModerationService {
    #[must_use]
    pub fn new(
        settings: TrackerSettings,
        store: Arc<dyn ConfigStore>,
        enforcer: Arc<dyn Enforcer>,
    ) -> Self {
        Self {
            tracker: ViolationTracker::new(),
            settings: Arc::new(settings),
            store,
            enforcer,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &ViolationTracker {
        &self.tracker
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    #[must_use]
    pub fn enforcer(&self) -> &Arc<dyn Enforcer> {
        &self.enforcer
    }

    /// Drop windows that can no longer contribute to any count
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let removed = self.tracker.prune_idle(now, self.settings.longest_window());
        if removed > 0 {
            debug!("Pruned {removed} idle violation windows");
        }
        removed
    }

    /// Run one event through the pipeline
    ///
    /// Never fails: store and enforcement errors are logged and reflected in the outcome.
    pub async fn process(
        &self,
        event: &ViolationEvent,
        actor: &ActorProfile,
        facts: &ScopeFacts,
        remediation: Option<Remediation>,
    ) -> Outcome {
        let config = match self.store.get_or_default(event.scope_id).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Dropping {} event in guild {}: config unavailable: {e}",
                    event.category, event.scope_id
                );
                return Outcome::ConfigUnavailable;
            }
        };

        if !config.is_active(event.category) {
            return Outcome::Disabled;
        }

        if let Some(reason) = config.exemption(actor, facts, event.category) {
            debug!(
                "User {} exempt from {} in guild {}: {reason}",
                event.actor_id, event.category, event.scope_id
            );
            return Outcome::Exempt(reason);
        }

        let key = event.key();
        let spec = self.settings.spec_for(event.category);
        let mut count = 0;
        for _ in 0..event.occurrences.max(1) {
            count = self.tracker.record_and_count(key, event.timestamp, spec);
        }

        let policy = config.policy(event.category).capped_at(spec.capacity());
        let Some(decision) = evaluate(&policy, count) else {
            debug!(
                "User {} has {count}/{} {} violations in guild {}",
                event.actor_id, policy.threshold, event.category, event.scope_id
            );
            return Outcome::Recorded { count };
        };

        let reason = format!("{} limit exceeded ({count} in window)", event.category);
        let punished = self
            .enforcer
            .punish(event.scope_id, event.actor_id, &decision, &reason)
            .await;

        let remediated = match remediation {
            Some(remediation) => Some(self.remediate(event.scope_id, &remediation).await),
            None => None,
        };

        let outcome = match punished {
            Ok(()) => {
                self.tracker.reset(&key);
                info!(
                    target: ENFORCEMENT_TARGET,
                    guild_id = event.scope_id,
                    user_id = event.actor_id,
                    category = %event.category,
                    action = %decision.action,
                    count = count,
                    event = "enforced",
                    "Enforcement applied"
                );
                Outcome::Enforced {
                    decision,
                    count,
                    remediated,
                }
            }
            Err(e) => {
                warn!(
                    target: ENFORCEMENT_TARGET,
                    guild_id = event.scope_id,
                    user_id = event.actor_id,
                    category = %event.category,
                    action = %decision.action,
                    count = count,
                    error = %e,
                    event = "failed",
                    "Enforcement failed"
                );
                Outcome::EnforcementFailed {
                    decision,
                    count,
                    remediated,
                }
            }
        };

        if let Some(channel_id) = config.log_channel_id {
            self.report(channel_id, event, &outcome).await;
        }

        outcome
    }

    async fn remediate(&self, scope_id: u64, remediation: &Remediation) -> bool {
        match self.enforcer.remediate(scope_id, remediation).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: ENFORCEMENT_TARGET,
                    guild_id = scope_id,
                    remediation = %remediation.describe(),
                    error = %e,
                    event = "remediation_failed",
                    "Remediation failed"
                );
                false
            }
        }
    }

    async fn report(&self, channel_id: u64, event: &ViolationEvent, outcome: &Outcome) {
        let (decision, verb, remediated) = match outcome {
            Outcome::Enforced {
                decision,
                remediated,
                ..
            } => (decision, "applied", remediated),
            Outcome::EnforcementFailed {
                decision,
                remediated,
                ..
            } => (decision, "failed", remediated),
            _ => return,
        };

        let mut content = format!(
            "**{}** by <@{}>: {} {verb}",
            event.category, event.actor_id, decision.action
        );
        match remediated {
            Some(true) => content.push_str(", damage reverted"),
            Some(false) => content.push_str(", damage could not be reverted"),
            None => {}
        }

        if let Err(e) = self.enforcer.report(channel_id, &content).await {
            warn!("Failed to post moderation report to channel {channel_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::{EnforcementError, MockEnforcer};
    use crate::moderation::{PunishmentAction, WindowSpec};
    use crate::store::{MemoryConfigStore, modify};
    use mockall::predicate::eq;

    const GUILD: u64 = 100;
    const OFFENDER: u64 = 555;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn facts() -> ScopeFacts {
        ScopeFacts {
            scope_id: GUILD,
            owner_id: Some(1),
            bot_user_id: 2,
            bot_owner_ids: vec![3],
        }
    }

    fn settings() -> TrackerSettings {
        TrackerSettings::new(WindowSpec::from_secs(12, 10).unwrap())
            .with_override(
                ViolationCategory::SpamMessage,
                WindowSpec::from_secs(7, 20).unwrap(),
            )
    }

    async fn enabled_store() -> Arc<MemoryConfigStore> {
        let store = Arc::new(MemoryConfigStore::new());
        modify(&*store, GUILD, |c| c.enabled = true).await.unwrap();
        store
    }

    fn service(store: Arc<MemoryConfigStore>, enforcer: MockEnforcer) -> ModerationService {
        ModerationService::new(settings(), store, Arc::new(enforcer))
    }

    fn event(category: ViolationCategory, seconds: i64) -> ViolationEvent {
        ViolationEvent::new(GUILD, category, OFFENDER, at(seconds))
    }

    #[tokio::test]
    async fn test_channel_delete_fires_on_first_violation() {
        let mut enforcer = MockEnforcer::new();
        enforcer
            .expect_punish()
            .withf(|guild, user, decision, _| {
                *guild == GUILD && *user == OFFENDER && decision.action == PunishmentAction::Kick
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        enforcer
            .expect_remediate()
            .with(
                eq(GUILD),
                eq(Remediation::RestoreChannel {
                    name: "general".to_string(),
                    kind: poise::serenity_prelude::ChannelType::Text,
                    parent: None,
                }),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(enabled_store().await, enforcer);
        let outcome = service
            .process(
                &event(ViolationCategory::ChannelDelete, 0),
                &ActorProfile::new(OFFENDER),
                &facts(),
                Some(Remediation::RestoreChannel {
                    name: "general".to_string(),
                    kind: poise::serenity_prelude::ChannelType::Text,
                    parent: None,
                }),
            )
            .await;

        assert!(matches!(
            outcome,
            Outcome::Enforced {
                count: 1,
                remediated: Some(true),
                ..
            }
        ));
        // Window is cleared after a successful punishment
        let key = ViolationKey::new(GUILD, ViolationCategory::ChannelDelete, OFFENDER);
        let spec = WindowSpec::from_secs(12, 10).unwrap();
        assert_eq!(service.tracker().count(&key, at(0), spec), 0);
    }

    #[tokio::test]
    async fn test_threshold_below_records_only() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            c.policy_mut(ViolationCategory::MassBan).threshold = 3;
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(1).returning(|_, _, _, _| Ok(()));
        let service = service(store, enforcer);

        let actor = ActorProfile::new(OFFENDER);
        let first = service
            .process(&event(ViolationCategory::MassBan, 0), &actor, &facts(), None)
            .await;
        let second = service
            .process(&event(ViolationCategory::MassBan, 1), &actor, &facts(), None)
            .await;
        let third = service
            .process(&event(ViolationCategory::MassBan, 2), &actor, &facts(), None)
            .await;

        assert_eq!(first, Outcome::Recorded { count: 1 });
        assert_eq!(second, Outcome::Recorded { count: 2 });
        assert!(third.fired());
    }

    #[tokio::test]
    async fn test_disabled_master_switch_records_nothing() {
        let store = Arc::new(MemoryConfigStore::new());
        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().never();
        let service = service(store, enforcer);

        let outcome = service
            .process(
                &event(ViolationCategory::RoleCreate, 0),
                &ActorProfile::new(OFFENDER),
                &facts(),
                None,
            )
            .await;

        assert_eq!(outcome, Outcome::Disabled);
        assert!(service.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_exempt_actor_is_never_recorded() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            c.whitelist.insert(OFFENDER);
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().never();
        let service = service(store, enforcer);

        for seconds in 0..5 {
            let outcome = service
                .process(
                    &event(ViolationCategory::BotAdd, seconds),
                    &ActorProfile::new(OFFENDER),
                    &facts(),
                    None,
                )
                .await;
            assert_eq!(outcome, Outcome::Exempt(Exemption::Whitelisted));
        }

        let owner = service
            .process(
                &ViolationEvent::new(GUILD, ViolationCategory::BotAdd, 1, at(0)),
                &ActorProfile::new(1),
                &facts(),
                None,
            )
            .await;
        assert_eq!(owner, Outcome::Exempt(Exemption::GuildOwner));
        assert!(service.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_failed_punishment_keeps_window_and_still_remediates() {
        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(2).returning(|guild, user, _, _| {
            Err(EnforcementError::Hierarchy {
                guild_id: guild,
                user_id: user,
            })
        });
        enforcer
            .expect_remediate()
            .times(2)
            .returning(|_, _| Err(EnforcementError::ValidationFailed("gone".to_string())));

        let service = service(enabled_store().await, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        let first = service
            .process(
                &event(ViolationCategory::WebhookCreate, 0),
                &actor,
                &facts(),
                Some(Remediation::DeleteWebhook(9)),
            )
            .await;
        let second = service
            .process(
                &event(ViolationCategory::WebhookCreate, 1),
                &actor,
                &facts(),
                Some(Remediation::DeleteWebhook(10)),
            )
            .await;

        assert!(matches!(
            first,
            Outcome::EnforcementFailed {
                count: 1,
                remediated: Some(false),
                ..
            }
        ));
        assert!(matches!(second, Outcome::EnforcementFailed { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_mentions_count_per_occurrence() {
        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(1).returning(|_, _, _, _| Ok(()));
        let service = service(enabled_store().await, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        let single = service
            .process(
                &event(ViolationCategory::MassMention, 0).with_occurrences(1),
                &actor,
                &facts(),
                None,
            )
            .await;
        assert_eq!(single, Outcome::Recorded { count: 1 });

        let double = service
            .process(
                &event(ViolationCategory::MassMention, 20).with_occurrences(2),
                &actor,
                &facts(),
                None,
            )
            .await;
        assert!(matches!(double, Outcome::Enforced { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_window_expiry_between_violations() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            c.policy_mut(ViolationCategory::RoleDelete).threshold = 5;
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().never();
        let service = service(store, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        for seconds in 0..4 {
            service
                .process(&event(ViolationCategory::RoleDelete, seconds), &actor, &facts(), None)
                .await;
        }
        let later = service
            .process(&event(ViolationCategory::RoleDelete, 15), &actor, &facts(), None)
            .await;
        assert_eq!(later, Outcome::Recorded { count: 1 });
    }

    #[tokio::test]
    async fn test_report_posted_to_log_channel() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| c.log_channel_id = Some(77)).await.unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().returning(|_, _, _, _| Ok(()));
        enforcer
            .expect_report()
            .withf(|channel, content| *channel == 77 && content.contains("Bot Add"))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(store, enforcer);
        let outcome = service
            .process(
                &event(ViolationCategory::BotAdd, 0),
                &ActorProfile::new(OFFENDER),
                &facts(),
                None,
            )
            .await;
        assert!(outcome.fired());
    }

    #[tokio::test]
    async fn test_unsupported_config_fails_closed() {
        let store = Arc::new(MemoryConfigStore::new());
        store
            .put(
                GUILD,
                crate::moderation::GuildModerationConfig {
                    version: 42,
                    enabled: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().never();
        let service = service(store, enforcer);

        let outcome = service
            .process(
                &event(ViolationCategory::ChannelCreate, 0),
                &ActorProfile::new(OFFENDER),
                &facts(),
                None,
            )
            .await;
        assert_eq!(outcome, Outcome::ConfigUnavailable);
        assert!(service.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_spam_uses_its_own_window() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            let spam = c.policy_mut(ViolationCategory::SpamMessage);
            spam.enabled = true;
            spam.threshold = 3;
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer
            .expect_punish()
            .withf(|_, _, decision, _| decision.action == PunishmentAction::Timeout)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let service = service(store, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        // Spaced 4s apart, the 7s spam window only ever holds two
        for seconds in [0, 4, 8, 12] {
            let outcome = service
                .process(&event(ViolationCategory::SpamMessage, seconds), &actor, &facts(), None)
                .await;
            assert!(!outcome.fired());
        }
        let burst = service
            .process(&event(ViolationCategory::SpamMessage, 13), &actor, &facts(), None)
            .await;
        assert!(burst.fired());
    }

    #[tokio::test]
    async fn test_threshold_equal_to_capacity_fires() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            c.policy_mut(ViolationCategory::MassBan).threshold = 10;
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(1).returning(|_, _, _, _| Ok(()));
        let service = service(store, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        for _ in 0..9 {
            let outcome = service
                .process(&event(ViolationCategory::MassBan, 0), &actor, &facts(), None)
                .await;
            assert!(!outcome.fired());
        }
        let tenth = service
            .process(&event(ViolationCategory::MassBan, 0), &actor, &facts(), None)
            .await;
        assert!(matches!(tenth, Outcome::Enforced { count: 10, .. }));
    }

    #[tokio::test]
    async fn test_stored_threshold_above_capacity_still_fires() {
        let store = enabled_store().await;
        modify(&*store, GUILD, |c| {
            c.policy_mut(ViolationCategory::MassBan).threshold = 15;
        })
        .await
        .unwrap();

        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(5).returning(|_, _, _, _| Ok(()));
        let service = service(store, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        let mut fired = 0;
        for _ in 0..50 {
            let outcome = service
                .process(&event(ViolationCategory::MassBan, 0), &actor, &facts(), None)
                .await;
            if outcome.fired() {
                fired += 1;
            }
        }
        assert_eq!(fired, 5);
    }

    #[tokio::test]
    async fn test_failed_remediation_keeps_successful_punishment() {
        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(1).returning(|_, _, _, _| Ok(()));
        enforcer
            .expect_remediate()
            .times(1)
            .returning(|_, _| Err(EnforcementError::ValidationFailed("missing".to_string())));

        let service = service(enabled_store().await, enforcer);
        let outcome = service
            .process(
                &event(ViolationCategory::RoleCreate, 0),
                &ActorProfile::new(OFFENDER),
                &facts(),
                Some(Remediation::DeleteRole(44)),
            )
            .await;

        assert!(matches!(
            outcome,
            Outcome::Enforced {
                count: 1,
                remediated: Some(false),
                ..
            }
        ));
        let key = ViolationKey::new(GUILD, ViolationCategory::RoleCreate, OFFENDER);
        let spec = WindowSpec::from_secs(12, 10).unwrap();
        assert_eq!(service.tracker().count(&key, at(0), spec), 0);
    }

    #[tokio::test]
    async fn test_mass_mention_resets_after_firing() {
        let mut enforcer = MockEnforcer::new();
        enforcer.expect_punish().times(1).returning(|_, _, _, _| Ok(()));
        let service = service(enabled_store().await, enforcer);
        let actor = ActorProfile::new(OFFENDER);

        let first = service
            .process(&event(ViolationCategory::MassMention, 0), &actor, &facts(), None)
            .await;
        let second = service
            .process(&event(ViolationCategory::MassMention, 1), &actor, &facts(), None)
            .await;
        let third = service
            .process(&event(ViolationCategory::MassMention, 2), &actor, &facts(), None)
            .await;

        assert_eq!(first, Outcome::Recorded { count: 1 });
        assert!(matches!(second, Outcome::Enforced { count: 2, .. }));
        assert_eq!(third, Outcome::Recorded { count: 1 });
    }
}
