//! Thread-safe containers used for the scheduler's shared bookkeeping.
//!
//! Reads take a shared lock and may run alongside each other; every
//! mutation takes the exclusive lock. `parking_lot` locks do not poison, so
//! none of these operations can fail.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// An ordered list behind a read/write lock.
#[derive(Debug)]
pub struct LockingVec<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for LockingVec<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T> LockingVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.write().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn pop_front(&self) -> Option<T> {
        let mut items = self.items.write();
        if items.is_empty() {
            None
        } else {
            Some(items.remove(0))
        }
    }

    /// Visits every item under the shared lock.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.items.read().iter().for_each(|item| f(item));
    }

    /// Removes and returns every item matching `predicate`, preserving the
    /// order of both the removed and the remaining items.
    pub fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut items = self.items.write();
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(items.len());
        for item in items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push(item);
            }
        }
        *items = kept;
        removed
    }

    /// Stable sort by key.
    pub fn sort_by_key<K: Ord>(&self, key: impl FnMut(&T) -> K) {
        self.items.write().sort_by_key(key);
    }
}

/// A counter with atomic read-modify-write.
#[derive(Debug, Default)]
pub struct LockingCounter {
    value: AtomicUsize,
}

impl LockingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` and returns the new value.
    pub fn add(&self, amount: usize) -> usize {
        self.value.fetch_add(amount, Ordering::AcqRel) + amount
    }

    pub fn value(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn contents<T: Clone>(list: &LockingVec<T>) -> Vec<T> {
        let mut items = Vec::new();
        list.for_each(|item| items.push(item.clone()));
        items
    }

    #[test]
    fn remove_where_keeps_order_of_survivors() {
        let list = LockingVec::new();
        for n in 1..=6 {
            list.push(n);
        }
        let removed = list.remove_where(|n| n % 2 == 0);
        assert_eq!(removed, vec![2, 4, 6]);
        assert_eq!(contents(&list), vec![1, 3, 5]);
    }

    #[test]
    fn sort_is_stable() {
        let list = LockingVec::new();
        for item in [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')] {
            list.push(item);
        }
        list.sort_by_key(|(priority, _)| *priority);
        let order: Vec<char> = contents(&list).into_iter().map(|(_, tag)| tag).collect();
        assert_eq!(order, vec!['b', 'd', 'a', 'c']);
    }

    #[test]
    fn pop_front_drains_in_order() {
        let list = LockingVec::new();
        list.push("first");
        list.push("second");
        assert_eq!(list.pop_front(), Some("first"));
        assert_eq!(list.pop_front(), Some("second"));
        assert_eq!(list.pop_front(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn counter_add_returns_new_value_across_threads() {
        let counter = Arc::new(LockingCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        counter.add(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.value(), 800);
        assert_eq!(counter.add(1), 801);
    }
}
