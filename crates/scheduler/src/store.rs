use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::watcher::Watcher;

/// Concurrent registry of scheduled policies, keyed by policy name.
///
/// Readers share the lock; [`get_all`](PolicyStore::get_all) hands out a
/// point-in-time copy rather than a live view.
#[derive(Default)]
pub struct PolicyStore {
    watchers: RwLock<HashMap<String, Arc<Watcher>>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. An empty name is ignored.
    pub fn put(&self, name: &str, watcher: Arc<Watcher>) {
        if name.is_empty() {
            return;
        }
        self.write().insert(name.to_string(), watcher);
    }

    /// Insert only if `name` is free. Returns `false` on conflict.
    pub fn put_if_absent(&self, name: &str, watcher: Arc<Watcher>) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.write().entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(watcher);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Watcher>> {
        self.read().get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Remove and return the entry, or `None` if it was absent.
    pub fn remove(&self, name: &str) -> Option<Arc<Watcher>> {
        self.write().remove(name)
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn get_all(&self) -> Vec<Arc<Watcher>> {
        self.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Empty the store under a single write lock and return what it held.
    pub fn drain(&self) -> Vec<Arc<Watcher>> {
        self.write().drain().map(|(_, watcher)| watcher).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Watcher>>> {
        self.watchers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Watcher>>> {
        self.watchers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{OneShotPolicy, OneShotPolicyConfiguration};
    use tokio::sync::mpsc;

    fn watcher(name: &str) -> Arc<Watcher> {
        let (stats, _) = mpsc::channel(1);
        let (unschedule, _) = mpsc::channel(1);
        let policy = Arc::new(OneShotPolicy::new(name, OneShotPolicyConfiguration { fire_at: 0 }));
        Arc::new(Watcher::new(policy, stats, unschedule))
    }

    #[test]
    fn put_get_remove() {
        let store = PolicyStore::new();
        store.put("a", watcher("a"));
        store.put("b", watcher("b"));

        assert_eq!(store.size(), 2);
        assert!(store.exists("a"));
        assert_eq!(store.get("a").unwrap().policy().name(), "a");

        let removed = store.remove("a").unwrap();
        assert_eq!(removed.policy().name(), "a");
        assert!(store.remove("a").is_none());
        assert!(!store.exists("a"));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn put_if_absent_keeps_first() {
        let store = PolicyStore::new();
        assert!(store.put_if_absent("a", watcher("first")));
        assert!(!store.put_if_absent("a", watcher("second")));
        assert_eq!(store.get("a").unwrap().policy().name(), "first");
        assert!(!store.put_if_absent("", watcher("anon")));
    }

    #[test]
    fn empty_name_is_ignored() {
        let store = PolicyStore::new();
        store.put("", watcher("anon"));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn snapshot_is_not_live() {
        let store = PolicyStore::new();
        store.put("a", watcher("a"));
        let snapshot = store.get_all();
        store.remove("a");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn drain_empties_and_returns_entries() {
        let store = PolicyStore::new();
        store.put("a", watcher("a"));
        store.put("b", watcher("b"));

        let mut names: Vec<_> = store
            .drain()
            .iter()
            .map(|w| w.policy().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.size(), 0);
        assert!(store.drain().is_empty());
    }

    #[test]
    fn concurrent_writers() {
        let store = Arc::new(PolicyStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let name = format!("p-{}-{}", i, j);
                        store.put(&name, watcher(&name));
                        let _ = store.get_all();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.size(), 200);
    }
}
