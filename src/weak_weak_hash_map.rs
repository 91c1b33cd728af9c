use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::weak::WeakElement;
use crate::weak::WeakKey;
use crate::weak_entry::BothEntry;
use crate::weak_entry::WeakEntry;
use crate::weak_table::WeakTable;

/// A hash map whose keys and values are both held weakly.
///
/// An entry is visible only while both its key and its value are alive.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use std::rc::Weak;
///
/// use rh_weak_table::WeakWeakHashMap;
///
/// let mut map: WeakWeakHashMap<Weak<u32>, Weak<String>> = WeakWeakHashMap::new();
/// let id = Rc::new(1);
/// let name = Rc::new("one".to_string());
/// map.insert(Rc::clone(&id), Rc::clone(&name));
///
/// assert!(map.contains_key(&1));
/// drop(name);
/// assert!(!map.contains_key(&1));
/// ```
pub struct WeakWeakHashMap<K, V, S = DefaultHashBuilder> {
    table: WeakTable<BothEntry<K, V>, S>,
}

impl<K: Clone, V: Clone, S: Clone> Clone for WeakWeakHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, V, S> Debug for WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    K::Strong: Debug,
    V: WeakElement,
    V::Strong: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher + Default,
{
    /// Creates an empty map using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map with `capacity` buckets using the default hasher
    /// builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: WeakTable::with_hasher(hash_builder),
        }
    }

    /// Creates an empty map with `capacity` buckets and the given hasher
    /// builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: WeakTable::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    /// Returns the number of occupied buckets, including expired entries that
    /// have not been reclaimed yet.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no buckets at all.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Drops every entry whose key or value has expired.
    pub fn remove_expired(&mut self) {
        self.table.remove_expired();
    }

    /// Inserts a pair, holding both sides weakly. Returns the previous value
    /// if the key was mapped to a live one.
    pub fn insert(&mut self, key: K::Strong, value: V::Strong) -> Option<V::Strong> {
        self.table
            .insert((key, value))
            .and_then(WeakEntry::into_strong)
            .map(|(_, previous)| previous)
    }

    /// Returns the live value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V::Strong>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(key).map(|(_, value)| value)
    }

    /// Returns strong pointers to the stored key and its value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(K::Strong, V::Strong)>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(key)
    }

    /// Returns `true` if `key` maps to a live value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    /// Removes the entry for `key`, returning its value if it was live.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V::Strong>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, value) = self.table.remove(key)?.into_strong()?;
        Some(value)
    }

    /// Returns an iterator over live entries, both sides upgraded.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys of live entries.
    pub fn keys(&self) -> impl Iterator<Item = K::Strong> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values of live entries.
    pub fn values(&self) -> impl Iterator<Item = V::Strong> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Empties the map, yielding the entries that were still live.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> crate::weak_table::DebugStats {
        self.table.debug_stats()
    }
}

/// An iterator over the live entries of a [`WeakWeakHashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::weak_table::Iter<'a, BothEntry<K, V>>,
}

impl<K: WeakKey, V: WeakElement> Iterator for Iter<'_, K, V> {
    type Item = (K::Strong, V::Strong);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over a [`WeakWeakHashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::weak_table::Drain<'a, BothEntry<K, V>>,
}

impl<K: WeakKey, V: WeakElement> Iterator for Drain<'_, K, V> {
    type Item = (K::Strong, V::Strong);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, K, V, S> IntoIterator for &'a WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher,
{
    type IntoIter = Iter<'a, K, V>;
    type Item = (K::Strong, V::Strong);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> FromIterator<(K::Strong, V::Strong)> for WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K::Strong, V::Strong)>>(iter: I) -> Self {
        let mut map = WeakWeakHashMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K::Strong, V::Strong)> for WeakWeakHashMap<K, V, S>
where
    K: WeakKey,
    V: WeakElement,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K::Strong, V::Strong)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
