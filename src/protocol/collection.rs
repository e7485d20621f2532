//! Insertion-ordered map for wire collections
//!
//! Wire order is observable for every map the protocol carries, so the
//! codec never uses a hashed map for payload data. Null values are
//! expressed as `Option` in the value type (custom payloads allow them),
//! which keeps "key present with null value" distinct from "key absent".

use std::borrow::Borrow;
use std::fmt;

/// A map that preserves insertion order and allows any value type,
/// including `Option` values standing in for protocol nulls.
///
/// Lookup is a linear scan; wire maps are small (options, custom
/// payloads, reason maps). Inserting an existing key overwrites its value
/// in place, so the key keeps its original position. Equality is
/// order-sensitive, matching what the wire would carry.
#[derive(Clone, PartialEq, Eq)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> OrderedMap<K, V> {
    /// Create an empty map
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create an empty map with pre-allocated capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the map has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K: PartialEq, V> OrderedMap<K, V> {
    /// Insert an entry; an existing key keeps its position and the last
    /// value wins
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a value by key
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Check whether a key is present
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut map = OrderedMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        map.insert("c", 3);

        let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_last_value_wins_in_place() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 10);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&10));
        let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_null_values_distinct_from_absent() {
        let mut map: OrderedMap<String, Option<Vec<u8>>> = OrderedMap::new();
        map.insert("present".into(), Some(vec![1]));
        map.insert("null".into(), None);

        assert!(map.contains_key("null"));
        assert_eq!(map.get("null"), Some(&None));
        assert!(!map.contains_key("absent"));
    }

    #[test]
    fn test_order_sensitive_equality() {
        let ab: OrderedMap<_, _> = [("a", 1), ("b", 2)].into_iter().collect();
        let ba: OrderedMap<_, _> = [("b", 2), ("a", 1)].into_iter().collect();
        assert_ne!(ab, ba);
    }
}
