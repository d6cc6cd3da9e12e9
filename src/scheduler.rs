//! Keyed, cancellable delayed tasks
//!
//! Used for giveaway endings and ticket auto-close. Scheduling a key that is
//! already pending replaces (and aborts) the earlier task.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

struct ScheduledTask {
    id: u64,
    handle: AbortHandle,
}

/// Pending delayed actions keyed by `K`
pub struct DelayedTasks<K>
where
    K: Eq + Hash,
{
    tasks: Arc<DashMap<K, ScheduledTask>>,
    next_id: Arc<AtomicU64>,
}

impl<K> Clone for DelayedTasks<K>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K> Default for DelayedTasks<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K> fmt::Debug for DelayedTasks<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTasks")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl<K> DelayedTasks<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless cancelled first
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let task_key = key.clone();

        // Holding the entry while spawning keeps a zero delay from firing before insertion
        let entry = self.tasks.entry(key);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tasks.remove_if(&task_key, |_, task| task.id == id).is_some() {
                debug!("Delayed task {task_key:?} firing");
                action.await;
            }
        })
        .abort_handle();

        let replaced = match entry {
            Entry::Occupied(mut occupied) => Some(occupied.insert(ScheduledTask { id, handle })),
            Entry::Vacant(vacant) => {
                vacant.insert(ScheduledTask { id, handle });
                None
            }
        };

        if let Some(previous) = replaced {
            debug!("Replacing pending delayed task");
            previous.handle.abort();
        }
    }

    /// Cancel the pending task for `key`; `false` if none was pending
    pub fn cancel(&self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some((_, task)) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(counter: &Arc<AtomicUsize>, by: usize) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(by, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let tasks = DelayedTasks::new();
        let fired = counter();

        tasks.schedule(1u64, Duration::from_secs(600), bump(&fired, 1));
        assert!(tasks.is_scheduled(&1));

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!tasks.is_scheduled(&1));
        // Too late to cancel
        assert!(!tasks.cancel(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_action() {
        let tasks = DelayedTasks::new();
        let fired = counter();

        tasks.schedule("ticket", Duration::from_secs(600), bump(&fired, 1));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(tasks.cancel(&"ticket"));
        assert!(!tasks.cancel(&"ticket"));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous() {
        let tasks = DelayedTasks::new();
        let fired = counter();

        tasks.schedule(7u64, Duration::from_secs(10), bump(&fired, 1));
        tasks.schedule(7u64, Duration::from_secs(20), bump(&fired, 10));
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_keys() {
        let tasks = DelayedTasks::new();
        let fired = counter();

        tasks.schedule(1u64, Duration::from_secs(5), bump(&fired, 1));
        tasks.schedule(2u64, Duration::from_secs(5), bump(&fired, 100));
        assert!(tasks.cancel(&2));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_still_fires() {
        let tasks = DelayedTasks::new();
        let fired = counter();

        tasks.schedule(3u64, Duration::ZERO, bump(&fired, 1));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(tasks.is_empty());
    }
}
