//! Per-scope lock table for read-modify-write cycles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

type ScopeKey = (String, String);

/// Keyed mutexes, one per (cluster, namespace).
///
/// Callers hold a scope's lock across one read-modify-write cycle of that
/// scope's documents. Unrelated scopes never contend. An entry lives only
/// while some caller holds or waits on its scope.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    locks: Mutex<HashMap<ScopeKey, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, cluster: &str, namespace: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry((cluster.to_string(), namespace.to_string()))
                .or_default(),
        )
    }

    /// Runs `f` while holding the lock for `(cluster, namespace)`.
    pub fn with_scope<T>(&self, cluster: &str, namespace: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.scope(cluster, namespace);
        let value = {
            let _guard = lock.lock();
            f()
        };
        self.release(cluster, namespace, &lock);
        value
    }

    fn release(&self, cluster: &str, namespace: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // The table and this caller are the only holders.
        if Arc::strong_count(lock) == 2 {
            locks.remove(&(cluster.to_string(), namespace.to_string()));
        }
    }

    /// Returns the number of scopes currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no scope is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn returns_closure_value() {
        let locks = ScopeLocks::new();
        assert_eq!(locks.with_scope("c1", "team-a", || 42), 42);
        assert!(locks.is_empty());
    }

    #[test]
    fn entries_released_after_use() {
        let locks = ScopeLocks::new();
        for i in 0..100 {
            locks.with_scope("c1", &format!("ns-{i}"), || {
                assert_eq!(locks.len(), 1);
            });
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn scopes_are_distinct() {
        let locks = ScopeLocks::new();
        locks.with_scope("c1", "team-a", || {
            // A different scope is free while team-a is held.
            locks.with_scope("c1", "team-b", || assert_eq!(locks.len(), 2));
            locks.with_scope("c2", "team-a", || assert_eq!(locks.len(), 2));
            assert_eq!(locks.len(), 1);
        });
        assert!(locks.is_empty());
    }

    #[test]
    fn same_scope_is_serialized() {
        let locks = Arc::new(ScopeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_scope("c1", "team-a", || {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(locks.is_empty());
    }
}
