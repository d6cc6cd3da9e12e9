//! Message content detectors and the per-user message trail

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock};

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://|discord\.gg/|discord\.com/invite/)").expect("link pattern is valid")
});

/// Whether `content` carries a URL or an invite
#[must_use]
pub fn contains_link(content: &str) -> bool {
    LINK.is_match(content)
}

/// Number of mention occurrences in a message
#[must_use]
pub fn mention_count(users: usize, roles: usize, everyone: bool) -> usize {
    users + roles + usize::from(everyone)
}

/// Highest number of times any single whitespace token occurs, ignoring case
#[must_use]
pub fn max_token_repeat(content: &str) -> usize {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in content.split_whitespace() {
        *counts.entry(token.to_lowercase()).or_default() += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

/// First blacklisted word found in `content`
#[must_use]
pub fn find_blacklisted<'a>(content: &str, words: &'a [String]) -> Option<&'a str> {
    let lowered = content.to_lowercase();
    words
        .iter()
        .map(String::as_str)
        .filter(|w| !w.is_empty())
        .find(|w| lowered.contains(&w.to_lowercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrailEntry {
    channel_id: u64,
    message_id: u64,
    at: DateTime<Utc>,
}

/// Recent message ids per `(guild, user)`, used to clean up after a spam burst
#[derive(Clone)]
pub struct MessageTrail {
    entries: Arc<DashMap<(u64, u64), VecDeque<TrailEntry>>>,
    capacity: usize,
}

impl MessageTrail {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Remember a message, evicting the oldest beyond capacity
    pub fn push(
        &self,
        guild_id: u64,
        user_id: u64,
        channel_id: u64,
        message_id: u64,
        at: DateTime<Utc>,
    ) {
        let mut trail = self.entries.entry((guild_id, user_id)).or_default();
        trail.push_back(TrailEntry {
            channel_id,
            message_id,
            at,
        });
        while trail.len() > self.capacity {
            trail.pop_front();
        }
    }

    /// Message ids in `channel_id` no older than `within`, newest first, at most `limit`
    #[must_use]
    pub fn recent(
        &self,
        guild_id: u64,
        user_id: u64,
        channel_id: u64,
        now: DateTime<Utc>,
        within: Duration,
        limit: usize,
    ) -> Vec<u64> {
        self.entries
            .get(&(guild_id, user_id))
            .map(|trail| {
                trail
                    .iter()
                    .rev()
                    .filter(|e| e.channel_id == channel_id && now - e.at <= within)
                    .take(limit)
                    .map(|e| e.message_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&self, guild_id: u64, user_id: u64) {
        self.entries.remove(&(guild_id, user_id));
    }

    /// Drop trails whose newest message is older than `max_age`
    pub fn prune_idle(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, trail| trail.back().is_some_and(|e| now - e.at < max_age));
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MessageTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTrail")
            .field("users", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_contains_link() {
        assert!(contains_link("see https://example.com"));
        assert!(contains_link("HTTP://EXAMPLE.COM"));
        assert!(contains_link("join discord.gg/abc"));
        assert!(contains_link("discord.com/invite/xyz"));
        assert!(!contains_link("no links here, just example.com"));
    }

    #[test]
    fn test_mention_count() {
        assert_eq!(mention_count(0, 0, false), 0);
        assert_eq!(mention_count(2, 0, false), 2);
        assert_eq!(mention_count(1, 1, true), 3);
    }

    #[test]
    fn test_max_token_repeat() {
        assert_eq!(max_token_repeat(""), 0);
        assert_eq!(max_token_repeat("hello world"), 1);
        assert_eq!(max_token_repeat("spam Spam SPAM eggs"), 3);
    }

    #[test]
    fn test_find_blacklisted() {
        let words = vec!["Bad".to_string(), String::new(), "worse".to_string()];
        assert_eq!(find_blacklisted("this is BAD", &words), Some("Bad"));
        assert_eq!(find_blacklisted("worsening", &words), Some("worse"));
        assert_eq!(find_blacklisted("all fine", &words), None);
    }

    #[test]
    fn test_trail_recent_filters_channel_and_age() {
        let trail = MessageTrail::new(10);
        trail.push(1, 2, 100, 1, at(0));
        trail.push(1, 2, 200, 2, at(1));
        trail.push(1, 2, 100, 3, at(5));
        trail.push(1, 2, 100, 4, at(6));

        let ids = trail.recent(1, 2, 100, at(7), Duration::seconds(3), 10);
        assert_eq!(ids, vec![4, 3]);

        let ids = trail.recent(1, 2, 100, at(7), Duration::seconds(60), 1);
        assert_eq!(ids, vec![4]);

        assert!(trail.recent(1, 9, 100, at(7), Duration::seconds(60), 10).is_empty());
    }

    #[test]
    fn test_trail_capacity_and_clear() {
        let trail = MessageTrail::new(2);
        for id in 0..5 {
            trail.push(1, 2, 100, id, at(0));
        }
        assert_eq!(trail.recent(1, 2, 100, at(0), Duration::seconds(1), 10), vec![4, 3]);

        trail.clear(1, 2);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_trail_prune_idle() {
        let trail = MessageTrail::new(5);
        trail.push(1, 2, 100, 1, at(0));
        trail.push(1, 3, 100, 2, at(50));

        assert_eq!(trail.prune_idle(at(60), Duration::seconds(30)), 1);
        assert_eq!(trail.len(), 1);
    }
}
