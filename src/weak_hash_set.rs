use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::DefaultHashBuilder;
use crate::weak::WeakKey;
use crate::weak_entry::SetEntry;
use crate::weak_table::WeakTable;

/// A hash set whose elements are held weakly.
///
/// `WeakHashSet<T, S>` stores weak handles of type `T` (for example
/// [`std::rc::Weak`]) and hashes the values behind them with `S`. An element
/// stays in the set only while some strong pointer to it is alive elsewhere;
/// after that it silently disappears from lookups and iteration.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use std::rc::Weak;
///
/// use rh_weak_table::WeakHashSet;
///
/// let mut set: WeakHashSet<Weak<i32>> = WeakHashSet::new();
/// let five = Rc::new(5);
/// set.insert(Rc::clone(&five));
///
/// assert!(set.contains(&5));
/// assert!(!set.contains(&6));
///
/// drop(five);
/// assert!(!set.contains(&5));
/// ```
pub struct WeakHashSet<T, S = DefaultHashBuilder> {
    table: WeakTable<SetEntry<T>, S>,
}

impl<T: Clone, S: Clone> Clone for WeakHashSet<T, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T, S> Debug for WeakHashSet<T, S>
where
    T: WeakKey,
    T::Strong: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher + Default,
{
    /// Creates an empty set using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty set with `capacity` buckets using the default hasher
    /// builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S> Default for WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher,
{
    /// Creates an empty set with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::hash_map::RandomState;
    /// use std::sync::Weak;
    ///
    /// use rh_weak_table::WeakHashSet;
    ///
    /// let set: WeakHashSet<Weak<str>, _> = WeakHashSet::with_hasher(RandomState::new());
    /// assert!(set.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: WeakTable::with_hasher(hash_builder),
        }
    }

    /// Creates an empty set with `capacity` buckets and the given hasher
    /// builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: WeakTable::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Returns a reference to the set's hasher builder.
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }

    /// Returns the number of occupied buckets, counting elements that have
    /// expired but not yet been reclaimed.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set holds no buckets at all.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves room for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Drops every expired element, making [`len`](Self::len) exact.
    pub fn remove_expired(&mut self) {
        self.table.remove_expired();
    }

    /// Adds an element to the set, holding it weakly.
    ///
    /// Returns `true` if no live equal element was present. Otherwise the
    /// stored handle is replaced by one pointing at `value` and `false` is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::WeakHashSet;
    ///
    /// let mut set: WeakHashSet<Weak<String>> = WeakHashSet::new();
    /// let name = Rc::new("name".to_string());
    ///
    /// assert!(set.insert(Rc::clone(&name)));
    /// assert!(!set.insert(Rc::clone(&name)));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T::Strong) -> bool {
        self.table.insert(value).is_none()
    }

    /// Returns `true` if a live element equal to `value` is present.
    #[doc(alias = "member")]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(value)
    }

    /// Returns a strong pointer to the live element equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<T::Strong>
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(value)
    }

    /// Removes the element equal to `value`. Returns `true` if a live element
    /// was removed.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(value).is_some()
    }

    /// Removes the element equal to `value` and returns a strong pointer to it.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T::Strong>
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(value)?.weak().view()
    }

    /// Returns an iterator over strong pointers to the live elements, in
    /// arbitrary order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Empties the set, yielding strong pointers to the elements that were
    /// still live.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns `true` if every live element of `self` is also in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::WeakHashSet;
    ///
    /// let (a, b) = (Rc::new('a'), Rc::new('b'));
    /// let small: WeakHashSet<Weak<char>> = [Rc::clone(&a)].into_iter().collect();
    /// let large: WeakHashSet<Weak<char>> = [Rc::clone(&a), Rc::clone(&b)].into_iter().collect();
    ///
    /// assert!(small.is_subset(&large));
    /// assert!(!large.is_subset(&small));
    /// ```
    pub fn is_subset<S2>(&self, other: &WeakHashSet<T, S2>) -> bool
    where
        S2: BuildHasher,
    {
        self.iter().all(|value| other.contains(T::view_key(&value)))
    }

    /// Computes a histogram of probe distances. See
    /// [`WeakTable::probe_histogram`].
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        self.table.probe_histogram()
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> crate::weak_table::DebugStats {
        self.table.debug_stats()
    }

    /// Pretty-prints the probe-distance histogram using stdout.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_probe_histogram(&self) {
        self.table.print_probe_histogram();
    }
}

/// An iterator over strong pointers to the live elements of a
/// [`WeakHashSet`].
pub struct Iter<'a, T> {
    inner: crate::weak_table::Iter<'a, SetEntry<T>>,
}

impl<T: WeakKey> Iterator for Iter<'_, T> {
    type Item = T::Strong;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over a [`WeakHashSet`].
pub struct Drain<'a, T> {
    inner: crate::weak_table::Drain<'a, SetEntry<T>>,
}

impl<T: WeakKey> Iterator for Drain<'_, T> {
    type Item = T::Strong;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T, S> IntoIterator for &'a WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher,
{
    type IntoIter = Iter<'a, T>;
    type Item = T::Strong;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, S> FromIterator<T::Strong> for WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T::Strong>>(iter: I) -> Self {
        let mut set = WeakHashSet::new();
        set.extend(iter);
        set
    }
}

impl<T, S> Extend<T::Strong> for WeakHashSet<T, S>
where
    T: WeakKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T::Strong>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}
