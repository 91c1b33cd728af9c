use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::weak::WeakKey;
use crate::weak_entry::KeyEntry;
use crate::weak_table::WeakTable;

/// A hash map whose keys are held weakly and whose values are owned.
///
/// An entry lives as long as its key does. Once the last strong pointer to a
/// key is dropped, the entry disappears from lookups and iteration, and its
/// value is dropped when the bucket is reclaimed.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use std::rc::Weak;
///
/// use rh_weak_table::WeakKeyHashMap;
///
/// let mut map: WeakKeyHashMap<Weak<str>, u32> = WeakKeyHashMap::new();
/// let key: Rc<str> = Rc::from("session");
///
/// map.insert(Rc::clone(&key), 42);
/// assert_eq!(map.get("session"), Some(&42));
///
/// drop(key);
/// assert_eq!(map.get("session"), None);
/// ```
pub struct WeakKeyHashMap<K, V, S = DefaultHashBuilder> {
    table: WeakTable<KeyEntry<K, V>, S>,
}

impl<K: Clone, V: Clone, S: Clone> Clone for WeakKeyHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, V, S> Debug for WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    K::Strong: Debug,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
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

impl<K, V, S> Default for WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
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

    /// Returns the number of occupied buckets, counting entries whose key has
    /// expired but whose bucket has not been reclaimed yet.
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

    /// Drops every entry whose key has expired, making [`len`](Self::len)
    /// exact.
    pub fn remove_expired(&mut self) {
        self.table.remove_expired();
    }

    /// Inserts a key-value pair, holding the key weakly.
    ///
    /// If a live equal key is present, its value is replaced and the old value
    /// is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::WeakKeyHashMap;
    ///
    /// let mut map: WeakKeyHashMap<Weak<u8>, &str> = WeakKeyHashMap::new();
    /// let key = Rc::new(1);
    /// assert_eq!(map.insert(Rc::clone(&key), "a"), None);
    /// assert_eq!(map.insert(Rc::clone(&key), "b"), Some("a"));
    /// assert_eq!(map[&1], "b");
    /// ```
    pub fn insert(&mut self, key: K::Strong, value: V) -> Option<V> {
        self.table.insert((key, value)).map(KeyEntry::into_value)
    }

    /// Returns a reference to the value for a live key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(key).map(KeyEntry::value)
    }

    /// Returns a mutable reference to the value for a live key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_mut(key).map(KeyEntry::value_mut)
    }

    /// Returns a strong pointer to the stored key together with its value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(K::Strong, &V)>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(key)
    }

    /// Returns `true` if the map holds a live entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    /// Removes the entry for a live key and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(key).map(KeyEntry::into_value)
    }

    /// Returns an iterator over live entries as `(strong key, &value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over strong pointers to the live keys.
    pub fn keys(&self) -> impl Iterator<Item = K::Strong> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values of live entries.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Empties the map, yielding the entries whose keys were still live.
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

impl<K, V, S, Q> core::ops::Index<&Q> for WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    K::Key: Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    /// Returns the value for a live key.
    ///
    /// # Panics
    ///
    /// Panics if the key is absent or has expired.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no live entry for key")
    }
}

/// An iterator over the live entries of a [`WeakKeyHashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::weak_table::Iter<'a, KeyEntry<K, V>>,
}

impl<'a, K: WeakKey, V> Iterator for Iter<'a, K, V> {
    type Item = (K::Strong, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over a [`WeakKeyHashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::weak_table::Drain<'a, KeyEntry<K, V>>,
}

impl<K: WeakKey, V> Iterator for Drain<'_, K, V> {
    type Item = (K::Strong, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, K, V, S> IntoIterator for &'a WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    S: BuildHasher,
{
    type IntoIter = Iter<'a, K, V>;
    type Item = (K::Strong, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> FromIterator<(K::Strong, V)> for WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K::Strong, V)>>(iter: I) -> Self {
        let mut map = WeakKeyHashMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K::Strong, V)> for WeakKeyHashMap<K, V, S>
where
    K: WeakKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K::Strong, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
