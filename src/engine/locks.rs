use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock name guarding creation, request resolution, claim and delete
pub const WITHDRAW: &str = "withdraw";
/// Lock name making the callback sweep single-flight
pub const CALLBACKS: &str = "callbacks";
/// Lock name shared by the fallback sweep and forced fallback
pub const FALLBACKS: &str = "fallbacks";

/// Named in-process critical sections: a mapping from lock name to a fair
/// async mutex. Waiters queue FIFO, so scheduled sweeps and API callers form
/// one queue of intent per name. No cross-process guarantee is implied.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the named lock, held for as long as the returned guard lives.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_name_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let running = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(WITHDRAW).await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_names_are_independent() {
        let locks = KeyedLocks::new();
        let _withdraw = locks.acquire(WITHDRAW).await;
        // Would deadlock if names shared a mutex
        let _callbacks = locks.acquire(CALLBACKS).await;
        let _fallbacks = locks.acquire(FALLBACKS).await;
    }
}
