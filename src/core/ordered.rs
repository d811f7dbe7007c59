//! Insertion-ordered sets.
//!
//! Manifest lists keep the order in which entries were first seen while
//! collapsing duplicates, so that merged records render the same way no matter
//! how many times an entry was reported.

use std::collections::HashSet;
use std::hash::Hash;

/// A de-duplicating list that preserves first-seen order.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T> OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Create an empty set.
    pub fn new() -> Self {
        OrderedSet {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append an item unless it is already present.
    ///
    /// Returns `true` if the item was added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    /// Append every item of `other` that is not already present.
    ///
    /// Returns the number of items added.
    pub fn union(&mut self, other: &OrderedSet<T>) -> usize {
        let mut added = 0;
        for item in &other.items {
            if self.insert(item.clone()) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, item: &T) -> bool {
        self.seen.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Rebuild the set by mapping every item, collapsing items that map to
    /// the same value.
    pub fn map<F>(&self, f: F) -> OrderedSet<T>
    where
        F: FnMut(&T) -> T,
    {
        self.items.iter().map(f).collect()
    }
}

impl<T> Default for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        OrderedSet::new()
    }
}

impl<T: PartialEq> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq> Eq for OrderedSet<T> {}

impl<T> Extend<T> for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T> FromIterator<T> for OrderedSet<T>
where
    T: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        set.extend(iter);
        set
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
