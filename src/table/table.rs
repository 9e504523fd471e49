//! The plain (non-transactional) keyed [`Table`] (spec §4.5).

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::error::PipeError;
use crate::table::observer::{ChangeKind, Observer, ObserverFn, ObserverMode};

/// A mapping from key type `K` to record type `V`, with observer callbacks
/// fired on every insert/update/delete.
///
/// Storage is a `BTreeMap` behind a single writer lock (spec §5: "Table
/// operations take a single writer lock per call") — `K: Ord` is required
/// throughout so that [`Table::range_scan`] is always available, matching
/// §4.5's "if K is ordered" caveat by construction rather than by a
/// secondary trait bound split.
pub struct Table<K: Ord + Clone, V: Clone> {
    name: String,
    data: RwLock<BTreeMap<K, V>>,
    observers: Mutex<Vec<Observer<K, V>>>,
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(BTreeMap::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds or replaces; returns 1. Fires `Insert` if the key was absent,
    /// `Update` otherwise.
    pub fn insert(&self, key: K, value: V) -> usize {
        let kind;
        {
            let mut data = self.data.write();
            kind = if data.contains_key(&key) {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            };
            data.insert(key.clone(), value.clone());
        }
        self.notify(&key, &value, kind);
        1
    }

    /// Removes if present; returns the number of records removed (0 or 1).
    pub fn erase(&self, key: &K) -> usize {
        let removed = self.data.write().remove(key);
        match removed {
            Some(value) => {
                self.notify(key, &value, ChangeKind::Delete);
                1
            }
            None => 0,
        }
    }

    pub fn get_by_key(&self, key: &K) -> Result<V, PipeError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| PipeError::KeyNotFound {
                table: self.name.clone(),
            })
    }

    /// A weakly consistent snapshot of all records: concurrent
    /// modifications made after this call are not observed by the returned
    /// iterator.
    pub fn select(&self) -> Vec<(K, V)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn select_where(&self, predicate: impl Fn(&V) -> bool) -> Vec<(K, V)> {
        self.data
            .read()
            .iter()
            .filter(|(_, v)| predicate(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn range_scan(&self, low: &K, high: &K) -> Vec<(K, V)> {
        self.data
            .read()
            .range(low.clone()..=high.clone())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn register_observer(&self, mode: ObserverMode, callback: ObserverFn<K, V>) {
        self.observers.lock().push(Observer { callback, mode });
    }

    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    pub fn drop_all(&self) {
        self.data.write().clear();
        self.observers.lock().clear();
    }

    fn notify(&self, key: &K, value: &V, kind: ChangeKind) {
        for observer in self.observers.lock().iter() {
            match observer.mode {
                ObserverMode::Immediate | ObserverMode::OnCommit => {
                    (observer.callback)(key, value, kind);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_erase_insert_matches_single_insert() {
        let t: Table<u32, String> = Table::new("t");
        t.insert(1, "a".to_string());
        t.erase(&1);
        t.insert(1, "a".to_string());

        let u: Table<u32, String> = Table::new("u");
        u.insert(1, "a".to_string());

        assert_eq!(t.select(), u.select());
    }

    #[test]
    fn get_by_key_missing_fails() {
        let t: Table<u32, String> = Table::new("t");
        assert!(matches!(
            t.get_by_key(&42),
            Err(PipeError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn range_scan_is_ordered() {
        let t: Table<u32, u32> = Table::new("t");
        for k in [5, 1, 3, 9, 2] {
            t.insert(k, k * 10);
        }
        let r = t.range_scan(&2, &5);
        assert_eq!(r, vec![(2, 20), (3, 30), (5, 50)]);
    }

    #[test]
    fn observers_fire_with_change_kind() {
        let t: Table<u32, u32> = Table::new("t");
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        t.register_observer(
            ObserverMode::Immediate,
            Box::new(move |k, v, kind| s.lock().push((*k, *v, kind))),
        );
        t.insert(1, 10);
        t.insert(1, 11);
        t.erase(&1);
        assert_eq!(
            *seen.lock(),
            vec![
                (1, 10, ChangeKind::Insert),
                (1, 11, ChangeKind::Update),
                (1, 11, ChangeKind::Delete),
            ]
        );
    }
}
