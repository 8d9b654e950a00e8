use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Mutation an instance lock is scoped to. Same (id, action) serializes;
/// everything else — same instance different action, same action different
/// instance — runs concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockAction {
    Default,
    AddContent,
    RemoveContent,
    ToggleContent,
}

/// Lazily populated map of per-(instance, action) mutexes.
///
/// `acquire` hands out an owned guard, so the lock is released on drop no
/// matter how the holding operation exits. tokio's mutex queues waiters in
/// acquisition order, which gives FIFO serialization per key.
#[derive(Default)]
pub struct LockMap {
    inner: StdMutex<HashMap<(String, LockAction), Arc<Mutex<()>>>>,
}

impl LockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, instance_id: &str, action: LockAction) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry((instance_id.to_string(), action))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(LockMap::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("alpha", LockAction::AddContent).await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let locks = Arc::new(LockMap::new());

        // Hold (alpha, AddContent); (beta, AddContent) and
        // (alpha, ToggleContent) must still be acquirable.
        let held = locks.acquire("alpha", LockAction::AddContent).await;

        let other_instance = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("beta", LockAction::AddContent),
        )
        .await;
        assert!(other_instance.is_ok());

        let other_action = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("alpha", LockAction::ToggleContent),
        )
        .await;
        assert!(other_action.is_ok());

        drop(held);
    }

    #[tokio::test]
    async fn guard_drop_releases_even_after_error_path() {
        let locks = LockMap::new();
        {
            let _guard = locks.acquire("alpha", LockAction::Default).await;
            // Simulated failure: guard is dropped by unwinding scope.
        }
        let reacquired = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("alpha", LockAction::Default),
        )
        .await;
        assert!(reacquired.is_ok());
    }
}
