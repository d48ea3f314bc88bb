//! Keyed trailing-edge debouncer
//!
//! Each key owns at most one pending task. Scheduling a key again aborts the
//! pending task and restarts the quiet period. A task whose quiet period has
//! elapsed runs to completion even if the key is rescheduled meanwhile.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

type PendingMap<K> = HashMap<K, (u64, JoinHandle<()>)>;

pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<PendingMap<K>>>,
    seq: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            seq: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once `key` has been quiet for the configured delay
    ///
    /// Must be called from within a Tokio runtime; otherwise the task is
    /// dropped with a warning.
    pub fn schedule<F, Fut>(&self, key: K, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(?key, "No async runtime, debounced task dropped");
            return;
        };

        let token = self.seq.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Held across spawn so the task cannot observe the map before insert
        let mut map = lock(&self.pending);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = lock(&pending);
                if map.get(&task_key).is_some_and(|(t, _)| *t == token) {
                    map.remove(&task_key);
                }
            }
            task().await;
        });

        if let Some((_, previous)) = map.insert(key, (token, handle)) {
            previous.abort();
            trace!("Debounce restarted");
        }
    }

    /// Drop the pending task for `key`, if any
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl<K> Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_quiet_period() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let runs = counter();

        let r = Arc::clone(&runs);
        debouncer.schedule("k", move || async move {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.is_pending(&"k"));

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending(&"k"));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_restarts_and_keeps_last() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let last = Arc::new(Mutex::new(0));

        for value in 1..=3 {
            let last = Arc::clone(&last);
            debouncer.schedule("k", move || async move {
                *last.lock().unwrap() = value;
            });
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(*last.lock().unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;
        assert_eq!(*last.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = counter();

        for key in ["a", "b"] {
            let r = Arc::clone(&runs);
            debouncer.schedule(key, move || async move {
                r.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_task() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = counter();

        let r = Arc::clone(&runs);
        debouncer.schedule("k", move || async move {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.cancel(&"k"));
        assert!(!debouncer.cancel(&"k"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn outside_runtime_is_dropped() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.schedule("k", || async {});
        assert!(!debouncer.is_pending(&"k"));
    }
}
