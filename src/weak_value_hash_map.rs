use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::weak::WeakElement;
use crate::weak_entry::ValueEntry;
use crate::weak_entry::WeakEntry;
use crate::weak_table::WeakTable;

/// A hash map with owned keys and weakly held values.
///
/// Lookups upgrade the stored value. An entry disappears as soon as its value
/// has no strong pointers left, which makes this map a natural interning or
/// cache index: it never keeps a value alive on its own.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::Weak;
///
/// use rh_weak_table::WeakValueHashMap;
///
/// let mut cache: WeakValueHashMap<u64, Weak<Vec<u8>>> = WeakValueHashMap::new();
/// let blob = Arc::new(vec![1, 2, 3]);
/// cache.insert(7, Arc::clone(&blob));
///
/// assert_eq!(cache.get(&7).as_deref(), Some(&vec![1, 2, 3]));
/// drop(blob);
/// assert!(cache.get(&7).is_none());
/// ```
pub struct WeakValueHashMap<K, V, S = DefaultHashBuilder> {
    table: WeakTable<ValueEntry<K, V>, S>,
}

impl<K: Clone, V: Clone, S: Clone> Clone for WeakValueHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, V, S> Debug for WeakValueHashMap<K, V, S>
where
    K: Hash + Eq + Debug,
    V: WeakElement,
    V::Strong: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
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

impl<K, V, S> Default for WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
    V: WeakElement,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
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

    /// Returns the number of occupied buckets, counting entries whose value
    /// has expired but whose bucket has not been reclaimed yet.
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

    /// Drops every entry whose value has expired.
    pub fn remove_expired(&mut self) {
        self.table.remove_expired();
    }

    /// Inserts a key-value pair, holding the value weakly.
    ///
    /// Returns the previous value if the key was mapped to a live one.
    pub fn insert(&mut self, key: K, value: V::Strong) -> Option<V::Strong> {
        self.table
            .insert((key, value))
            .and_then(WeakEntry::into_strong)
            .map(|(_, previous)| previous)
    }

    /// Returns the live value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V::Strong>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(key).map(|(_, value)| value)
    }

    /// Returns the stored key together with its live value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, V::Strong)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(key)
    }

    /// Returns `true` if `key` maps to a live value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(key)
    }

    /// Removes the entry for `key`, returning its value if it was live.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V::Strong>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, value) = self.table.remove(key)?.into_strong()?;
        Some(value)
    }

    /// Returns an iterator over `(&key, value)` pairs whose values are live.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys of live entries.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the live values.
    pub fn values(&self) -> impl Iterator<Item = V::Strong> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Empties the map, yielding the entries whose values were still live.
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

/// An iterator over the live entries of a [`WeakValueHashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::weak_table::Iter<'a, ValueEntry<K, V>>,
}

impl<'a, K: Hash + Eq, V: WeakElement> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, V::Strong);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over a [`WeakValueHashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::weak_table::Drain<'a, ValueEntry<K, V>>,
}

impl<K: Hash + Eq, V: WeakElement> Iterator for Drain<'_, K, V> {
    type Item = (K, V::Strong);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, K, V, S> IntoIterator for &'a WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
    V: WeakElement,
    S: BuildHasher,
{
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, V::Strong);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> FromIterator<(K, V::Strong)> for WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
    V: WeakElement,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V::Strong)>>(iter: I) -> Self {
        let mut map = WeakValueHashMap::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V::Strong)> for WeakValueHashMap<K, V, S>
where
    K: Hash + Eq,
    V: WeakElement,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V::Strong)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::rc::Weak;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    type Map<K, V> = WeakValueHashMap<K, Weak<V>, SipHashBuilder>;

    #[test]
    fn value_expiry_removes_entry() {
        let mut map: Map<String, u32> = WeakValueHashMap::new();
        let kept = Rc::new(1);
        let lost = Rc::new(2);
        map.insert("kept".to_string(), Rc::clone(&kept));
        map.insert("lost".to_string(), Rc::clone(&lost));

        assert!(map.contains_key("lost"));
        drop(lost);

        assert!(!map.contains_key("lost"));
        assert_eq!(map.get("lost"), None);
        assert_eq!(map.get("kept").as_deref(), Some(&1));
        assert_eq!(map.iter().count(), 1);

        map.remove_expired();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn insert_returns_previous_live_value() {
        let mut map: Map<u8, &str> = WeakValueHashMap::new();
        let first = Rc::new("first");
        let second = Rc::new("second");

        assert!(map.insert(1, Rc::clone(&first)).is_none());
        let previous = map.insert(1, Rc::clone(&second)).unwrap();
        assert!(Rc::ptr_eq(&previous, &first));
        assert_eq!(map.len(), 1);
        assert!(Rc::ptr_eq(&map.get(&1).unwrap(), &second));
    }

    #[test]
    fn insert_over_expired_value_is_fresh() {
        let mut map: Map<u8, u8> = WeakValueHashMap::new();
        map.insert(1, Rc::new(10));

        let replacement = Rc::new(11);
        assert!(map.insert(1, Rc::clone(&replacement)).is_none());
        assert_eq!(map.get(&1).as_deref(), Some(&11));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn get_key_value_borrows_key() {
        let mut map: Map<String, u32> = WeakValueHashMap::new();
        let value = Rc::new(5);
        map.insert("five".to_string(), Rc::clone(&value));

        let (key, locked) = map.get_key_value("five").unwrap();
        assert_eq!(key, "five");
        assert!(Rc::ptr_eq(&locked, &value));
    }

    #[test]
    fn remove_returns_live_value() {
        let mut map: Map<u32, u32> = WeakValueHashMap::new();
        let values: Vec<Rc<u32>> = (0..16).map(Rc::new).collect();
        map.extend(values.iter().map(|v| (**v, Rc::clone(v))));

        assert_eq!(map.remove(&4).as_deref(), Some(&4));
        assert!(map.remove(&4).is_none());
        assert_eq!(map.len(), 15);
        for k in (0..16u32).filter(|k| *k != 4) {
            assert!(map.contains_key(&k));
        }
    }

    #[test]
    fn keys_values_and_drain() {
        let values: Vec<Rc<String>> = ["a", "b", "c"]
            .iter()
            .map(|s| Rc::new(s.to_string()))
            .collect();
        let mut map: Map<usize, String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i, Rc::clone(v)))
            .collect();

        let mut keys: Vec<usize> = map.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![0, 1, 2]);

        let mut joined: Vec<String> = map.values().map(|v| (*v).clone()).collect();
        joined.sort();
        assert_eq!(joined, ["a", "b", "c"]);

        let drained: Vec<(usize, Rc<String>)> = map.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(map.is_empty());
    }

    #[test]
    fn debug_output() {
        let mut map: Map<u8, u8> = WeakValueHashMap::new();
        let value = Rc::new(9);
        map.insert(1, Rc::clone(&value));
        map.insert(2, Rc::new(8));

        assert_eq!(alloc::format!("{:?}", map), "{1: 9}");
    }
}
