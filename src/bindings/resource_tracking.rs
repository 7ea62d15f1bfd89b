// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Object-lifetime tracking.
//!
//! Every object the device issues lives in an [`ObjectTracker`]: a generational table from
//! an opaque handle to the record holding its native object.  The tracker is the only place
//! that maps handles to native objects, which gives the device two guarantees:
//!
//! - A handle is valid iff the tracker still holds its record.  Validity is an O(1) lookup
//!   that never touches the driver.
//! - A destroyed handle can never be resolved again, even if its slot is reused, because the
//!   generation stored in the key no longer matches.
//!
//! # Concurrency
//!
//! Records are guarded by a reader-writer lock.  Validity checks and lookups take the read
//! lock; creation and destruction take the write lock only for the insert or remove.
//! Destruction can therefore run concurrently with validity checks on other handles.
//!
//! Lock poisoning is ignored: a panic while holding the lock cannot leave a slotmap in a
//! torn state, since every mutation is a single insert or remove.

use slotmap::{Key, SlotMap};
use std::fmt::{Debug, Formatter};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) struct ObjectTracker<K: Key, V> {
    label: &'static str,
    objects: RwLock<SlotMap<K, V>>,
}

impl<K: Key, V> ObjectTracker<K, V> {
    pub fn new(label: &'static str) -> Self {
        ObjectTracker {
            label,
            objects: RwLock::new(SlotMap::with_key()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotMap<K, V>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotMap<K, V>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `value` and returns its new handle.
    pub fn insert(&self, value: V) -> K {
        self.write().insert(value)
    }

    /// Stops tracking `key`, returning its record if it was still live.
    pub fn remove(&self, key: K) -> Option<V> {
        self.write().remove(key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.read().contains_key(key)
    }

    /// Runs `f` against the record for `key` while holding the read lock.
    pub fn with<R>(&self, key: K, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.read().get(key).map(f)
    }

    /// Runs `f` against the record for `key` while holding the write lock.
    pub fn with_mut<R>(&self, key: K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.write().get_mut(key).map(f)
    }

    /// Removes every record for which `remove` returns true, returning them.
    pub fn extract_if(&self, mut remove: impl FnMut(K, &V) -> bool) -> Vec<(K, V)> {
        let mut objects = self.write();
        let doomed: Vec<K> = objects
            .iter()
            .filter(|(k, v)| remove(*k, v))
            .map(|(k, _)| k)
            .collect();
        doomed
            .into_iter()
            .filter_map(|k| objects.remove(k).map(|v| (k, v)))
            .collect()
    }

    /// Removes and returns every record.
    pub fn drain(&self) -> Vec<(K, V)> {
        self.write().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }
}

impl<K: Key, V: Clone> ObjectTracker<K, V> {
    /// A copy of the record for `key`.
    pub fn get(&self, key: K) -> Option<V> {
        self.read().get(key).cloned()
    }
}

impl<K: Key, V> Debug for ObjectTracker<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTracker")
            .field("label", &self.label)
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::handles::Resource;
    use std::sync::Arc;

    #[test]
    fn stale_handle_is_not_resolved_after_slot_reuse() {
        let tracker = ObjectTracker::<Resource, u32>::new("test");
        let a = tracker.insert(1);
        assert_eq!(tracker.remove(a), Some(1));
        let b = tracker.insert(2);
        assert!(!tracker.contains(a));
        assert_eq!(tracker.get(a), None);
        assert_eq!(tracker.get(b), Some(2));
    }

    #[test]
    fn extract_if_removes_matching() {
        let tracker = ObjectTracker::<Resource, u32>::new("test");
        let keep = tracker.insert(1);
        tracker.insert(2);
        tracker.insert(4);
        let removed = tracker.extract_if(|_, v| v % 2 == 0);
        assert_eq!(removed.len(), 2);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(keep));
    }

    #[test]
    fn concurrent_checks_during_destruction() {
        let tracker = Arc::new(ObjectTracker::<Resource, u32>::new("test"));
        let keys: Vec<Resource> = (0..256).map(|i| tracker.insert(i)).collect();
        let survivor = keys[0];
        let checker = {
            let tracker = tracker.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    assert!(tracker.contains(survivor));
                }
            })
        };
        for key in &keys[1..] {
            tracker.remove(*key);
        }
        checker.join().unwrap();
        assert_eq!(tracker.len(), 1);
    }
}
