use fnv::FnvHashMap;
use std::{collections::hash_map::Entry, hash::Hash, iter::FromIterator};

/// A hash map in which a key can be bound more than once.
///
/// `get` returns the most recent binding; `get_all` returns every binding for
/// a key, most recent first.
pub struct FnvHashMultimap<K, V>(FnvHashMap<K, Vec<V>>);

impl<K, V> FnvHashMultimap<K, V> {
    pub fn new() -> Self {
        FnvHashMultimap(FnvHashMap::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FnvHashMultimap(FnvHashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ))
    }
}

impl<K, V> Default for FnvHashMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> FnvHashMultimap<K, V> {
    pub fn contains<Key: ?Sized>(&self, item: &Key) -> bool
    where
        K: std::borrow::Borrow<Key>,
        Key: Eq + Hash,
    {
        self.0.contains_key(item)
    }

    pub fn get<Key: ?Sized>(&self, key: &Key) -> Option<&V>
    where
        K: std::borrow::Borrow<Key>,
        Key: Eq + Hash,
    {
        self.0.get(key).and_then(|values| values.last())
    }

    pub fn get_all<'a, Key: ?Sized>(&'a self, key: &Key) -> impl Iterator<Item = &'a V>
    where
        K: std::borrow::Borrow<Key>,
        Key: Eq + Hash,
    {
        self.0
            .get(key)
            .map(|values| values.iter().rev())
            .into_iter()
            .flatten()
    }

    pub fn insert(&mut self, key: K, value: V) {
        match self.0.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![value]);
            }
        }
    }

    pub fn remove<Key: ?Sized>(&mut self, key: &Key) -> Option<V>
    where
        K: std::borrow::Borrow<Key>,
        Key: Eq + Hash,
    {
        if let Some(values) = self.0.get_mut(key) {
            let value = match values.pop() {
                None => {
                    unreachable!()
                }
                Some(value) => value,
            };

            if values.is_empty() {
                self.0.remove(key);
            }

            Some(value)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for FnvHashMultimap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut multimap = Self::new();
        for (key, value) in iter {
            multimap.insert(key, value);
        }
        multimap
    }
}
