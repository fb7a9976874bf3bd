//! Thread-safe name-keyed store with point-in-time snapshots.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

/// Name-keyed store shared by concurrent callers.
///
/// Every operation takes the lock once, so each is atomic on its own.
/// [`Self::snapshot`] returns a copy: later writes to the store never show
/// up in it.
#[derive(Debug)]
pub struct SnapshotStore<T: Clone> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T: Clone> SnapshotStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or replaces the entry for `name`.
    pub async fn add(&self, name: impl Into<String>, entry: T) {
        self.entries.write().await.insert(name.into(), entry);
    }

    /// Inserts `entry` unless `name` is present. Returns true if inserted.
    pub async fn add_if_absent(&self, name: impl Into<String>, entry: T) -> bool {
        match self.entries.write().await.entry(name.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Returns a clone of the entry for `name`.
    pub async fn get(&self, name: &str) -> Option<T> {
        self.entries.read().await.get(name).cloned()
    }

    /// Removes the entry for `name`. Absent names are ignored.
    pub async fn delete(&self, name: &str) {
        self.entries.write().await.remove(name);
    }

    /// Returns an independent copy of every entry.
    pub async fn snapshot(&self) -> HashMap<String, T> {
        self.entries.read().await.clone()
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entry.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Every name in the store, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: Clone> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
