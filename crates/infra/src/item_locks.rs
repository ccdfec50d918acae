//! Per-item serialization of movement commits.
//!
//! Two movements on the same item queue behind one async mutex; movements on
//! different items proceed in parallel. The store's version check still backs
//! this up when several processes share a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use sitestock_core::ItemId;

/// Map size above which idle entries are dropped on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: Mutex<HashMap<ItemId, Arc<AsyncMutex<()>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `item_id`. Released when the guard drops.
    pub async fn acquire(&self, item_id: ItemId) -> OwnedMutexGuard<()> {
        let lock = {
            // The map holds no invariants a panicking thread could break.
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                // Only this map holds a reference to an idle lock.
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(locks.entry(item_id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_item_is_exclusive() {
        let locks = Arc::new(ItemLocks::new());
        let id = ItemId::new();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_items_do_not_block() {
        let locks = ItemLocks::new();
        let _a = locks.acquire(ItemId::new()).await;
        let _b = locks.acquire(ItemId::new()).await;
        assert_eq!(locks.tracked(), 2);
    }
}
