//! Rate-window violation tracker
//!
//! Keeps, per `(scope, category, actor)`, a bounded oldest-first record of recent
//! violation timestamps and answers how many fall inside the trailing window.

use super::ViolationCategory;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised when building a window specification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Window duration must be positive, got {0} seconds")]
    InvalidWindow(i64),

    #[error("Window capacity must be at least 1")]
    InvalidCapacity,
}

/// Composite identity of a violation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViolationKey {
    pub scope_id: u64,
    pub category: ViolationCategory,
    pub actor_id: u64,
}

impl ViolationKey {
    #[must_use]
    pub fn new(scope_id: u64, category: ViolationCategory, actor_id: u64) -> Self {
        Self {
            scope_id,
            category,
            actor_id,
        }
    }
}

/// Trailing window duration and retained-entry bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    window: Duration,
    capacity: usize,
}

impl WindowSpec {
    /// # Errors
    /// Returns an error if the window is not positive or the capacity is zero
    pub fn new(window: Duration, capacity: usize) -> Result<Self, TrackerError> {
        if window <= Duration::zero() {
            return Err(TrackerError::InvalidWindow(window.num_seconds()));
        }
        if capacity == 0 {
            return Err(TrackerError::InvalidCapacity);
        }
        Ok(Self { window, capacity })
    }

    /// # Errors
    /// Returns an error if `seconds` or `capacity` is zero
    pub fn from_secs(seconds: u64, capacity: usize) -> Result<Self, TrackerError> {
        let seconds = i64::try_from(seconds).map_err(|_| TrackerError::InvalidWindow(i64::MAX))?;
        Self::new(Duration::seconds(seconds), capacity)
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Oldest-first timestamps for one key
#[derive(Debug, Clone, Default)]
pub struct ViolationWindow {
    stamps: VecDeque<DateTime<Utc>>,
}

impl ViolationWindow {
    /// Append `now`, enforce the capacity bound, then drop expired entries
    fn record(&mut self, now: DateTime<Utc>, spec: WindowSpec) -> usize {
        let stamp = match self.stamps.back() {
            Some(&newest) if now < newest => {
                debug!(%now, %newest, "Out-of-order violation timestamp clamped to newest entry");
                newest
            }
            _ => now,
        };
        self.stamps.push_back(stamp);

        while self.stamps.len() > spec.capacity {
            self.stamps.pop_front();
        }

        self.prune(stamp, spec.window);
        self.stamps.len()
    }

    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        while self
            .stamps
            .front()
            .is_some_and(|&oldest| now - oldest >= window)
        {
            self.stamps.pop_front();
        }
    }

    fn newest(&self) -> Option<DateTime<Utc>> {
        self.stamps.back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Shared, concurrently usable violation tracker
#[derive(Clone, Default)]
pub struct ViolationTracker {
    windows: Arc<DashMap<ViolationKey, ViolationWindow>>,
}

impl ViolationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one violation for `key` at `now` and return the count inside the window
    pub fn record_and_count(&self, key: ViolationKey, now: DateTime<Utc>, spec: WindowSpec) -> usize {
        let mut window = self.windows.entry(key).or_default();
        window.record(now, spec)
    }

    /// Count the violations inside the window without recording a new one
    #[must_use]
    pub fn count(&self, key: &ViolationKey, now: DateTime<Utc>, spec: WindowSpec) -> usize {
        self.windows.get_mut(key).map_or(0, |mut window| {
            window.prune(now, spec.window);
            window.len()
        })
    }

    /// Forget every violation recorded for `key`
    pub fn reset(&self, key: &ViolationKey) {
        self.windows.remove(key);
    }

    /// Drop windows whose newest entry is older than `max_window`
    pub fn prune_idle(&self, now: DateTime<Utc>, max_window: Duration) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window
                .newest()
                .is_some_and(|newest| now - newest < max_window)
        });
        before - self.windows.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl std::fmt::Debug for ViolationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViolationTracker")
            .field("windows", &self.windows.len())
            .finish()
    }
}

/// Window specification per category
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    default: WindowSpec,
    overrides: HashMap<ViolationCategory, WindowSpec>,
}

impl TrackerSettings {
    #[must_use]
    pub fn new(default: WindowSpec) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_override(mut self, category: ViolationCategory, spec: WindowSpec) -> Self {
        self.overrides.insert(category, spec);
        self
    }

    #[must_use]
    pub fn spec_for(&self, category: ViolationCategory) -> WindowSpec {
        self.overrides.get(&category).copied().unwrap_or(self.default)
    }

    /// Longest window of any category, used for idle pruning
    #[must_use]
    pub fn longest_window(&self) -> Duration {
        self.overrides
            .values()
            .map(WindowSpec::window)
            .fold(self.default.window, Duration::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn key(actor: u64) -> ViolationKey {
        ViolationKey::new(1, ViolationCategory::ChannelDelete, actor)
    }

    #[test]
    fn test_window_spec_validation() {
        assert_eq!(
            WindowSpec::new(Duration::zero(), 10),
            Err(TrackerError::InvalidWindow(0))
        );
        assert_eq!(
            WindowSpec::from_secs(12, 0),
            Err(TrackerError::InvalidCapacity)
        );
        let spec = WindowSpec::from_secs(12, 10).unwrap();
        assert_eq!(spec.window(), Duration::seconds(12));
        assert_eq!(spec.capacity(), 10);
    }

    #[test]
    fn test_counts_then_prunes_after_window() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        for (i, t) in (0..4).enumerate() {
            assert_eq!(tracker.record_and_count(key(1), at(t), spec), i + 1);
        }

        // All four prior entries are at least 12 seconds old at t=15
        assert_eq!(tracker.record_and_count(key(1), at(15), spec), 1);
    }

    #[test]
    fn test_count_matches_trailing_window() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(5, 100).unwrap();
        let times: Vec<i64> = vec![0, 1, 3, 4, 6, 7, 11, 12, 20];

        for (idx, &t) in times.iter().enumerate() {
            let expected = times[..=idx].iter().filter(|&&s| t - s < 5).count();
            assert_eq!(tracker.record_and_count(key(2), at(t), spec), expected);
        }
    }

    #[test]
    fn test_burst_saturates_at_capacity() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        let mut last = 0;
        for _ in 0..15 {
            last = tracker.record_and_count(key(3), at(0), spec);
            assert!(last <= 10);
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_reset_then_record_returns_one() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        tracker.record_and_count(key(4), at(0), spec);
        tracker.record_and_count(key(4), at(1), spec);
        tracker.reset(&key(4));

        assert_eq!(tracker.record_and_count(key(4), at(2), spec), 1);
    }

    #[test]
    fn test_same_timestamp_records_each_call() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        assert_eq!(tracker.record_and_count(key(5), at(3), spec), 1);
        assert_eq!(tracker.record_and_count(key(5), at(3), spec), 2);
    }

    #[test]
    fn test_out_of_order_timestamp_is_clamped() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        tracker.record_and_count(key(6), at(10), spec);
        // An older replayed event is counted at the newest time, keeping order intact
        assert_eq!(tracker.record_and_count(key(6), at(2), spec), 2);
        // Both entries sit at t=10, so they expire together
        assert_eq!(tracker.record_and_count(key(6), at(22), spec), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        tracker.record_and_count(key(7), at(0), spec);
        tracker.record_and_count(key(7), at(1), spec);
        assert_eq!(tracker.record_and_count(key(8), at(1), spec), 1);

        let other_category = ViolationKey::new(1, ViolationCategory::RoleCreate, 7);
        assert_eq!(tracker.record_and_count(other_category, at(1), spec), 1);

        let other_scope = ViolationKey::new(2, ViolationCategory::ChannelDelete, 7);
        assert_eq!(tracker.record_and_count(other_scope, at(1), spec), 1);
    }

    #[test]
    fn test_count_does_not_record() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        assert_eq!(tracker.count(&key(9), at(0), spec), 0);
        tracker.record_and_count(key(9), at(0), spec);
        assert_eq!(tracker.count(&key(9), at(5), spec), 1);
        assert_eq!(tracker.count(&key(9), at(12), spec), 0);
    }

    #[test]
    fn test_prune_idle() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(12, 10).unwrap();

        tracker.record_and_count(key(10), at(0), spec);
        tracker.record_and_count(key(11), at(30), spec);

        assert_eq!(tracker.prune_idle(at(35), Duration::seconds(12)), 1);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let tracker = ViolationTracker::new();
        let spec = WindowSpec::from_secs(60, 1000).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let tracker = tracker.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        tracker.record_and_count(key(12), at(0), spec);
                    }
                });
            }
        });

        assert_eq!(tracker.count(&key(12), at(0), spec), 400);
    }

    #[test]
    fn test_tracker_settings_overrides() {
        let default = WindowSpec::from_secs(12, 10).unwrap();
        let spam = WindowSpec::from_secs(7, 20).unwrap();
        let settings =
            TrackerSettings::new(default).with_override(ViolationCategory::SpamMessage, spam);

        assert_eq!(settings.spec_for(ViolationCategory::MassBan), default);
        assert_eq!(settings.spec_for(ViolationCategory::SpamMessage), spam);
        assert_eq!(settings.longest_window(), Duration::seconds(12));
    }
}
