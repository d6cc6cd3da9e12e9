//! Delayed ticket deletion
//!
//! Closing a ticket deletes its channel after a grace period unless someone
//! asks to keep it open first.

use crate::scheduler::DelayedTasks;
use std::future::Future;
use std::time::Duration;

/// Grace period between `ticket close` and channel deletion
pub const CLOSE_DELAY: Duration = Duration::from_secs(600);

/// Pending ticket deletions keyed by channel id
#[derive(Clone, Debug)]
pub struct TicketCloser {
    timers: DelayedTasks<u64>,
    delay: Duration,
}

impl Default for TicketCloser {
    fn default() -> Self {
        Self::new(CLOSE_DELAY)
    }
}

impl TicketCloser {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            timers: DelayedTasks::new(),
            delay,
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` once the close delay passes; `true` if an earlier close was replaced
    pub fn close_with<F>(&self, channel_id: u64, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let replaced = self.timers.is_scheduled(&channel_id);
        self.timers.schedule(channel_id, self.delay, action);
        replaced
    }

    /// Keep the ticket open; `false` if no close was pending
    pub fn keep(&self, channel_id: u64) -> bool {
        self.timers.cancel(&channel_id)
    }

    #[must_use]
    pub fn is_closing(&self, channel_id: u64) -> bool {
        self.timers.is_scheduled(&channel_id)
    }
}
