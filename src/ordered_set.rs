//! A set that iterates in first-insertion order.
//!
//! Compiler flag lists, include paths, and defines all need set semantics for
//! deduplication while keeping the order they were declared in, because
//! argument order is often significant to the toolchain being invoked.

use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Returned by `remove` when the element is not in the set.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("element not found in set")]
pub struct KeyNotFound;

/// An insertion-ordered unique-element container.  Re-inserting an existing
/// element is a no-op and does not change its position.
#[derive(Clone, Default)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    index: FxHashMap<T, usize>,
}

impl<T: Hash + Eq + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        OrderedSet {
            items: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index.contains_key(value)
    }

    /// Returns true if the value was newly inserted.
    pub fn insert(&mut self, value: T) -> bool {
        if self.index.contains_key(&value) {
            return false;
        }
        self.index.insert(value.clone(), self.items.len());
        self.items.push(value);
        true
    }

    /// Removes a value; it is an error for it to be absent.
    pub fn remove(&mut self, value: &T) -> Result<(), KeyNotFound> {
        match self.index.remove(value) {
            None => Err(KeyNotFound),
            Some(pos) => {
                self.items.remove(pos);
                for idx in self.index.values_mut() {
                    if *idx > pos {
                        *idx -= 1;
                    }
                }
                Ok(())
            }
        }
    }

    /// Removes a value if present; never fails.
    pub fn discard(&mut self, value: &T) {
        let _ = self.remove(value);
    }

    /// Removes and returns the earliest-inserted element.
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let value = self.items.remove(0);
        self.index.remove(&value);
        for idx in self.index.values_mut() {
            *idx -= 1;
        }
        Some(value)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn union(&self, other: &OrderedSet<T>) -> OrderedSet<T> {
        let mut ret = self.clone();
        ret.update(other.iter().cloned());
        ret
    }

    pub fn intersection(&self, other: &OrderedSet<T>) -> OrderedSet<T> {
        let mut ret = self.clone();
        ret.intersection_update(other);
        ret
    }

    pub fn difference(&self, other: &OrderedSet<T>) -> OrderedSet<T> {
        let mut ret = self.clone();
        ret.difference_update(other);
        ret
    }

    pub fn symmetric_difference(&self, other: &OrderedSet<T>) -> OrderedSet<T> {
        let mut ret = self.clone();
        ret.symmetric_difference_update(other);
        ret
    }

    pub fn update(&mut self, iter: impl IntoIterator<Item = T>) {
        for value in iter {
            self.insert(value);
        }
    }

    pub fn intersection_update(&mut self, other: &OrderedSet<T>) {
        let keep: Vec<T> = self
            .items
            .iter()
            .filter(|v| other.contains(v))
            .cloned()
            .collect();
        self.clear();
        self.update(keep);
    }

    pub fn difference_update(&mut self, other: &OrderedSet<T>) {
        for value in other.iter() {
            self.discard(value);
        }
    }

    pub fn symmetric_difference_update(&mut self, other: &OrderedSet<T>) {
        for value in other.iter() {
            if self.contains(value) {
                self.discard(value);
            } else {
                self.insert(value.clone());
            }
        }
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        set.update(iter);
        set
    }
}

impl<T: Hash + Eq + Clone> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.update(iter);
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Hash + Eq + Clone> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T: Hash + Eq + Clone + std::fmt::Debug> std::fmt::Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}

impl<T: Hash + Eq + Clone> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Hash + Eq + Clone> std::ops::BitOr for &OrderedSet<T> {
    type Output = OrderedSet<T>;
    fn bitor(self, rhs: Self) -> OrderedSet<T> {
        self.union(rhs)
    }
}

impl<T: Hash + Eq + Clone> std::ops::BitAnd for &OrderedSet<T> {
    type Output = OrderedSet<T>;
    fn bitand(self, rhs: Self) -> OrderedSet<T> {
        self.intersection(rhs)
    }
}

impl<T: Hash + Eq + Clone> std::ops::Sub for &OrderedSet<T> {
    type Output = OrderedSet<T>;
    fn sub(self, rhs: Self) -> OrderedSet<T> {
        self.difference(rhs)
    }
}

impl<T: Hash + Eq + Clone> std::ops::BitXor for &OrderedSet<T> {
    type Output = OrderedSet<T>;
    fn bitxor(self, rhs: Self) -> OrderedSet<T> {
        self.symmetric_difference(rhs)
    }
}
