//! Giveaway record and state machine
//!
//! A giveaway is `Running` from creation until it is either `Ended` (winners
//! drawn) or `Cancelled`. Both are terminal; only an ended giveaway can be rerolled.

use super::{GiveawayError, GiveawayResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Maximum winners per giveaway
pub const MAX_WINNERS: u32 = 10;

/// Giveaway lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GiveawayState {
    #[default]
    Running,
    Ended,
    Cancelled,
}

impl std::fmt::Display for GiveawayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Ended => write!(f, "Ended"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// One giveaway, keyed by the id of its announcement message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveawayRecord {
    pub message_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub host_id: u64,
    pub prize: String,
    pub winner_count: u32,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub state: GiveawayState,
    #[serde(default)]
    pub entrants: BTreeSet<u64>,
    #[serde(default)]
    pub winners: Vec<u64>,
    pub created_at: DateTime<Utc>,
}

impl GiveawayRecord {
    /// Create a running giveaway
    ///
    /// # Errors
    /// Returns an error if `winner_count` is outside `1..=MAX_WINNERS`
    pub fn new(
        message_id: u64,
        guild_id: u64,
        channel_id: u64,
        host_id: u64,
        prize: impl Into<String>,
        winner_count: u32,
        ends_at: DateTime<Utc>,
    ) -> GiveawayResult<Self> {
        if !(1..=MAX_WINNERS).contains(&winner_count) {
            return Err(GiveawayError::InvalidWinnerCount(winner_count));
        }

        Ok(Self {
            message_id,
            guild_id,
            channel_id,
            host_id,
            prize: prize.into(),
            winner_count,
            ends_at,
            state: GiveawayState::Running,
            entrants: BTreeSet::new(),
            winners: Vec::new(),
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == GiveawayState::Running
    }

    /// Add an entrant; `false` if already entered or not running
    pub fn enter(&mut self, user_id: u64) -> bool {
        self.is_running() && self.entrants.insert(user_id)
    }

    /// Remove an entrant; `false` if not entered or not running
    pub fn leave(&mut self, user_id: u64) -> bool {
        self.is_running() && self.entrants.remove(&user_id)
    }

    /// Draw winners and move to `Ended`
    ///
    /// # Errors
    /// Returns an error if the giveaway is not running
    pub fn end<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GiveawayResult<&[u64]> {
        self.transition(GiveawayState::Ended)?;
        self.winners = pick_winners(&self.entrants, self.winner_count, self.host_id, rng);

        info!(
            message_id = %self.message_id,
            guild_id = %self.guild_id,
            entrants = self.entrants.len(),
            winners = ?self.winners,
            "Giveaway ended"
        );
        Ok(&self.winners)
    }

    /// Move to `Cancelled` without drawing
    ///
    /// # Errors
    /// Returns an error if the giveaway is not running
    pub fn cancel(&mut self) -> GiveawayResult<()> {
        self.transition(GiveawayState::Cancelled)?;
        info!(message_id = %self.message_id, guild_id = %self.guild_id, "Giveaway cancelled");
        Ok(())
    }

    /// Draw a fresh set of winners for an ended giveaway
    ///
    /// # Errors
    /// Returns an error unless the giveaway has ended
    pub fn reroll<R: Rng + ?Sized>(&mut self, rng: &mut R) -> GiveawayResult<&[u64]> {
        if self.state != GiveawayState::Ended {
            return Err(GiveawayError::InvalidTransition {
                from: self.state,
                to: GiveawayState::Ended,
            });
        }
        self.winners = pick_winners(&self.entrants, self.winner_count, self.host_id, rng);
        Ok(&self.winners)
    }

    fn transition(&mut self, to: GiveawayState) -> GiveawayResult<()> {
        if self.state != GiveawayState::Running {
            return Err(GiveawayError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Uniform sample of up to `count` distinct entrants, never the host
pub fn pick_winners<R: Rng + ?Sized>(
    entrants: &BTreeSet<u64>,
    count: u32,
    host_id: u64,
    rng: &mut R,
) -> Vec<u64> {
    let pool: Vec<u64> = entrants.iter().copied().filter(|&id| id != host_id).collect();
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    pool.choose_multiple(rng, count).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn record(winners: u32) -> GiveawayRecord {
        GiveawayRecord::new(10, 1, 2, 99, "Nitro", winners, Utc::now()).unwrap()
    }

    #[test]
    fn test_winner_count_bounds() {
        assert!(GiveawayRecord::new(1, 1, 1, 1, "x", 0, Utc::now()).is_err());
        assert!(GiveawayRecord::new(1, 1, 1, 1, "x", 11, Utc::now()).is_err());
        assert!(GiveawayRecord::new(1, 1, 1, 1, "x", 10, Utc::now()).is_ok());
    }

    #[test]
    fn test_enter_and_leave() {
        let mut giveaway = record(1);
        assert!(giveaway.enter(5));
        assert!(!giveaway.enter(5));
        assert!(giveaway.leave(5));
        assert!(!giveaway.leave(5));
    }

    #[test]
    fn test_end_draws_distinct_winners_excluding_host() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut giveaway = record(3);
        for user in [99, 1, 2, 3, 4, 5] {
            giveaway.enter(user);
        }

        let winners = giveaway.end(&mut rng).unwrap().to_vec();
        assert_eq!(winners.len(), 3);
        assert!(!winners.contains(&99));
        let unique: BTreeSet<u64> = winners.iter().copied().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(giveaway.state, GiveawayState::Ended);

        // Entries are frozen once ended
        assert!(!giveaway.enter(6));
    }

    #[test]
    fn test_fewer_entrants_than_winners() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut giveaway = record(5);
        giveaway.enter(1);
        giveaway.enter(2);

        let winners = giveaway.end(&mut rng).unwrap();
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn test_no_entrants() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut giveaway = record(1);
        assert!(giveaway.end(&mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut giveaway = record(1);
        assert!(giveaway.reroll(&mut rng).is_err());
        giveaway.cancel().unwrap();
        assert!(matches!(
            giveaway.end(&mut rng),
            Err(GiveawayError::InvalidTransition {
                from: GiveawayState::Cancelled,
                ..
            })
        ));
        assert!(giveaway.cancel().is_err());
        assert!(giveaway.reroll(&mut rng).is_err());

        let mut giveaway = record(1);
        giveaway.end(&mut rng).unwrap();
        assert!(giveaway.cancel().is_err());
    }

    #[test]
    fn test_reroll_after_end() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut giveaway = record(1);
        for user in 1..=20 {
            giveaway.enter(user);
        }
        giveaway.end(&mut rng).unwrap();

        let rerolled = giveaway.reroll(&mut rng).unwrap().to_vec();
        assert_eq!(rerolled.len(), 1);
        assert!(giveaway.entrants.contains(&rerolled[0]));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut giveaway = record(2);
        giveaway.enter(4);
        let yaml = serde_yaml::to_string(&giveaway).unwrap();
        let back: GiveawayRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, giveaway);
    }
}
