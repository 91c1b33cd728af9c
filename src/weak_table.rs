use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::mem::MaybeUninit;

use crate::DefaultHashBuilder;
use crate::fixed_vec::FixedVec;
use crate::weak_entry::WeakEntry;

/// Number of buckets allocated by [`WeakTable::new`].
pub const DEFAULT_CAPACITY: usize = 8;

/// Top bit of the bucket metadata word. Set once a bucket has been written
/// since the last resize.
const USED: usize = 1 << (usize::BITS - 1);

/// The hash bits stored alongside [`USED`].
const HASH_MASK: usize = !USED;

/// The table grows once `len / capacity` exceeds 3/4.
#[inline(always)]
fn exceeds_load_factor(len: usize, capacity: usize) -> bool {
    len as u128 * 4 > capacity as u128 * 3
}

#[inline(always)]
fn home_bucket(capacity: usize, hash_code: usize) -> usize {
    hash_code % capacity
}

#[inline(always)]
fn next_bucket(capacity: usize, pos: usize) -> usize {
    if pos + 1 == capacity { 0 } else { pos + 1 }
}

#[inline(always)]
fn probe_distance(capacity: usize, actual: usize, home: usize) -> usize {
    if actual >= home {
        actual - home
    } else {
        actual + capacity - home
    }
}

/// A table slot: one metadata word plus the entry.
///
/// `entry` is initialized if and only if the `USED` bit of `meta` is set, and
/// the hash bits of `meta` are only meaningful under the same condition. A
/// used bucket may hold an expired entry; it still counts towards the table's
/// length until it is reclaimed by an insertion or dropped by a resize.
struct Bucket<E> {
    meta: usize,
    entry: MaybeUninit<E>,
}

impl<E> Default for Bucket<E> {
    fn default() -> Self {
        Bucket {
            meta: 0,
            entry: MaybeUninit::uninit(),
        }
    }
}

impl<E: Clone> Clone for Bucket<E> {
    fn clone(&self) -> Self {
        match self.entry() {
            Some(entry) => Bucket {
                meta: self.meta,
                entry: MaybeUninit::new(entry.clone()),
            },
            None => Bucket::default(),
        }
    }
}

impl<E> Drop for Bucket<E> {
    fn drop(&mut self) {
        if self.is_used() {
            // SAFETY: The entry is initialized whenever the used bit is set.
            unsafe { self.entry.assume_init_drop() };
        }
    }
}

impl<E> Bucket<E> {
    #[inline(always)]
    fn is_used(&self) -> bool {
        self.meta & USED != 0
    }

    #[inline(always)]
    fn hash_code(&self) -> usize {
        self.meta & HASH_MASK
    }

    #[inline(always)]
    fn entry(&self) -> Option<&E> {
        if self.is_used() {
            // SAFETY: The entry is initialized whenever the used bit is set.
            Some(unsafe { self.entry.assume_init_ref() })
        } else {
            None
        }
    }

    #[inline(always)]
    fn entry_mut(&mut self) -> Option<&mut E> {
        if self.is_used() {
            // SAFETY: The entry is initialized whenever the used bit is set.
            Some(unsafe { self.entry.assume_init_mut() })
        } else {
            None
        }
    }

    /// Writes an entry into an unused bucket.
    #[inline(always)]
    fn fill(&mut self, hash_code: usize, entry: E) {
        debug_assert!(!self.is_used());
        debug_assert_eq!(hash_code & USED, 0);
        self.entry.write(entry);
        self.meta = USED | hash_code;
    }

    /// Swaps the contents of a used bucket, returning the previous hash code
    /// and entry.
    #[inline(always)]
    fn replace(&mut self, hash_code: usize, entry: E) -> (usize, E) {
        debug_assert!(self.is_used());
        let old_hash = self.hash_code();
        // SAFETY: The bucket is used, so the entry is initialized. It is read out
        // exactly once and immediately overwritten.
        let old_entry = unsafe { self.entry.assume_init_read() };
        self.entry.write(entry);
        self.meta = USED | hash_code;
        (old_hash, old_entry)
    }

    /// Moves the entry out, leaving the bucket unused.
    #[inline(always)]
    fn take(&mut self) -> Option<(usize, E)> {
        if !self.is_used() {
            return None;
        }
        let hash_code = self.hash_code();
        self.meta = 0;
        // SAFETY: The bucket was used, so the entry is initialized. Clearing the used
        // bit first makes sure it is never read or dropped again.
        Some((hash_code, unsafe { self.entry.assume_init_read() }))
    }
}

/// Debug statistics for hash table analysis.
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of used buckets, live or expired. Equal to `len()`.
    pub populated: usize,
    /// Total number of buckets.
    pub capacity: usize,
    /// Used buckets whose entry is still live.
    pub live_slots: usize,
    /// Used buckets whose entry has expired.
    pub expired_slots: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Live load factor (live_slots / capacity)
    pub live_load_factor: f64,
    /// Longest probe distance of any used bucket.
    pub max_probe_distance: usize,
    /// Mean probe distance over used buckets.
    pub mean_probe_distance: f64,
    /// Bytes held by the bucket array.
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Weak Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Live: {} ({:.2}% live load), expired: {}",
            self.live_slots,
            self.live_load_factor * 100.0,
            self.expired_slots
        );
        println!(
            "Probe distance: max {}, mean {:.3}",
            self.max_probe_distance, self.mean_probe_distance
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// An open-addressing hash table of weakly held entries, using Robin Hood
/// displacement.
///
/// `WeakTable<E, S>` stores entries of type `E` (see [`WeakEntry`]) and hashes
/// their keys with `S`. Entries hold their payload weakly: once every strong
/// pointer to a payload is dropped, the entry stops being visible to lookups
/// and iteration, and its bucket is reclaimed by a later insertion or by the
/// next resize. The table is never told about expiry; it observes it whenever
/// it probes a bucket.
///
/// Because expired entries are only dropped lazily, [`len`] is an upper bound
/// on the number of live entries. It is exact right after a resize or
/// [`remove_expired`].
///
/// Most code should use one of the typed collections built on top of this
/// table, such as [`WeakHashSet`](crate::WeakHashSet) or
/// [`WeakKeyHashMap`](crate::WeakKeyHashMap).
///
/// [`len`]: WeakTable::len
/// [`remove_expired`]: WeakTable::remove_expired
///
/// ## Example
///
/// ```rust
/// use std::rc::Rc;
/// use std::rc::Weak;
///
/// use rh_weak_table::SetEntry;
/// use rh_weak_table::WeakTable;
///
/// let mut table: WeakTable<SetEntry<Weak<str>>> = WeakTable::new();
/// let hello: Rc<str> = Rc::from("hello");
/// table.insert(Rc::clone(&hello));
///
/// assert!(table.contains("hello"));
/// drop(hello);
/// assert!(!table.contains("hello"));
/// ```
pub struct WeakTable<E, S = DefaultHashBuilder> {
    buckets: FixedVec<Bucket<E>>,
    populated: usize,
    hash_builder: S,
}

impl<E, S> Debug for WeakTable<E, S>
where
    E: WeakEntry,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;

        let capacity = self.buckets.len();
        f.debug_struct("WeakTable")
            .field(
                "metadata",
                &self
                    .buckets
                    .chunks(16)
                    .enumerate()
                    .map(|(row, chunk)| {
                        let mut items = Vec::new();
                        for (i, bucket) in chunk.iter().enumerate() {
                            match bucket.entry() {
                                None => items.push("..".to_string()),
                                Some(entry) if entry.is_expired() => {
                                    items.push("xx".to_string())
                                }
                                Some(_) => {
                                    let pos = row * 16 + i;
                                    let home = home_bucket(capacity, bucket.hash_code());
                                    items.push(format!(
                                        "{:02}",
                                        probe_distance(capacity, pos, home)
                                    ));
                                }
                            }
                        }
                        items.join(", ")
                    })
                    .collect::<Vec<String>>(),
            )
            .field("populated", &self.populated)
            .field("capacity", &capacity)
            .finish()
    }
}

impl<E, S> Clone for WeakTable<E, S>
where
    E: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            buckets: FixedVec::from_fn(self.buckets.len(), |i| self.buckets[i].clone()),
            populated: self.populated,
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<E, S> Default for WeakTable<E, S>
where
    E: WeakEntry,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S> WeakTable<E, S>
where
    E: WeakEntry,
    S: BuildHasher + Default,
{
    /// Creates an empty table with [`DEFAULT_CAPACITY`] buckets and the
    /// default hasher builder.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with exactly `capacity` buckets.
    ///
    /// A capacity of zero allocates nothing; the first insertion then grows
    /// the table to [`DEFAULT_CAPACITY`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::SetEntry;
    /// use rh_weak_table::WeakTable;
    ///
    /// let table: WeakTable<SetEntry<Weak<u32>>> = WeakTable::with_capacity(32);
    /// assert_eq!(table.capacity(), 32);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<E, S> WeakTable<E, S>
where
    E: WeakEntry,
    S: BuildHasher,
{
    /// Creates an empty table with [`DEFAULT_CAPACITY`] buckets and the given
    /// hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty table with exactly `capacity` buckets and the given
    /// hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            buckets: FixedVec::new(capacity),
            populated: 0,
            hash_builder,
        }
    }

    /// Returns a reference to the table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of used buckets.
    ///
    /// This counts entries that have expired but whose buckets have not been
    /// reclaimed yet, so it is an upper bound on the number of live entries.
    /// It is exact immediately after a resize or [`remove_expired`].
    ///
    /// [`remove_expired`]: WeakTable::remove_expired
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if no bucket is in use.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    #[inline]
    fn hash_key<Q: ?Sized + Hash>(&self, key: &Q) -> usize {
        (self.hash_builder.hash_one(key) as usize) & HASH_MASK
    }

    /// Inserts an element, keeping only a weak hold on it.
    ///
    /// If a live entry with an equal key is already present it is overwritten
    /// in place and returned; the length does not change. Otherwise the entry
    /// is placed by Robin Hood probing, possibly reclaiming the bucket of an
    /// expired entry, and `None` is returned. The table doubles its capacity
    /// once more than three quarters of its buckets are in use.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::KeyEntry;
    /// use rh_weak_table::WeakTable;
    ///
    /// let mut table: WeakTable<KeyEntry<Weak<u32>, &str>> = WeakTable::new();
    /// let key = Rc::new(1);
    ///
    /// assert!(table.insert((Rc::clone(&key), "one")).is_none());
    /// let previous = table.insert((Rc::clone(&key), "uno")).unwrap();
    /// assert_eq!(*previous.value(), "one");
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(&mut self, strong: E::Strong) -> Option<E> {
        if self.buckets.is_empty() {
            self.resize(DEFAULT_CAPACITY);
        }

        let key = E::strong_key(&strong);
        let hash = self.hash_key(key);
        if let Some(index) = self.find_index(hash, key) {
            let (_, previous) = self.buckets[index].replace(hash, E::from_strong(strong));
            return Some(previous);
        }

        self.insert_hashed(hash, E::from_strong(strong));
        self.maybe_grow();
        None
    }

    /// Places an entry whose key is known not to be present.
    ///
    /// The caller guarantees at least one unused bucket.
    fn insert_hashed(&mut self, mut hash: usize, mut entry: E) {
        let capacity = self.buckets.len();
        debug_assert!(self.populated < capacity);

        let mut pos = home_bucket(capacity, hash);
        let mut dist = 0;
        loop {
            let bucket = &mut self.buckets[pos];
            if !bucket.is_used() {
                bucket.fill(hash, entry);
                self.populated += 1;
                return;
            }

            let resident_dist = probe_distance(capacity, pos, home_bucket(capacity, bucket.hash_code()));

            // An expired resident may only be overwritten if nothing that probed past
            // it could have a shorter distance than the new occupant.
            if resident_dist <= dist && bucket.entry().is_some_and(|e| e.is_expired()) {
                bucket.replace(hash, entry);
                return;
            }

            if dist > resident_dist {
                (hash, entry) = bucket.replace(hash, entry);
                dist = resident_dist;
            }

            pos = next_bucket(capacity, pos);
            dist += 1;
            debug_assert!(dist < capacity, "probe wrapped around the table");
        }
    }

    fn find_index<Q>(&self, hash: usize, key: &Q) -> Option<usize>
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let capacity = self.buckets.len();
        if self.populated == 0 {
            return None;
        }

        let mut pos = home_bucket(capacity, hash);
        for dist in 0..capacity {
            let bucket = &self.buckets[pos];
            let entry = bucket.entry()?;

            if dist > probe_distance(capacity, pos, home_bucket(capacity, bucket.hash_code())) {
                return None;
            }

            if bucket.hash_code() == hash
                && entry.with_key(|k| <E::Key as Borrow<Q>>::borrow(k) == key) == Some(true)
            {
                return Some(pos);
            }

            pos = next_bucket(capacity, pos);
        }

        None
    }

    /// Returns `true` if a live entry with the given key is present.
    ///
    /// Lookups never modify the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::SetEntry;
    /// use rh_weak_table::WeakTable;
    ///
    /// let mut table: WeakTable<SetEntry<Weak<i32>>> = WeakTable::new();
    /// let five = Rc::new(5);
    /// table.insert(Rc::clone(&five));
    ///
    /// assert!(table.contains(&5));
    /// assert!(!table.contains(&6));
    /// ```
    #[doc(alias = "member")]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_index(self.hash_key(key), key).is_some()
    }

    /// Locks and returns the live entry with the given key.
    pub fn get<Q>(&self, key: &Q) -> Option<E::View<'_>>
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key)?.lock()
    }

    /// Returns the stored entry for the given key, if it is live.
    pub fn find<Q>(&self, key: &Q) -> Option<&E>
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(self.hash_key(key), key)?;
        self.buckets[index].entry()
    }

    /// Returns the stored entry for the given key mutably, if it is live.
    pub fn find_mut<Q>(&mut self, key: &Q) -> Option<&mut E>
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(self.hash_key(key), key)?;
        self.buckets[index].entry_mut()
    }

    /// Removes the live entry with the given key and returns it.
    ///
    /// The buckets after it are shifted back so that every remaining entry
    /// stays reachable.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<E>
    where
        E::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(self.hash_key(key), key)?;
        self.remove_at(index)
    }

    fn remove_at(&mut self, mut index: usize) -> Option<E> {
        let capacity = self.buckets.len();
        let (_, removed) = self.buckets[index].take()?;
        self.populated -= 1;

        loop {
            let next = next_bucket(capacity, index);
            let bucket = &mut self.buckets[next];
            if !bucket.is_used()
                || probe_distance(capacity, next, home_bucket(capacity, bucket.hash_code())) == 0
            {
                break;
            }

            if let Some((hash, entry)) = bucket.take() {
                self.buckets[index].fill(hash, entry);
            }
            index = next;
        }

        Some(removed)
    }

    /// Removes every entry, keeping the allocated buckets.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.take();
        }
        self.populated = 0;
    }

    /// Rehashes the table at its current capacity, dropping every expired
    /// entry. Afterwards [`len`](WeakTable::len) is exact.
    pub fn remove_expired(&mut self) {
        let capacity = self.buckets.len();
        if capacity != 0 {
            self.resize(capacity);
        }
    }

    /// Grows the table so that `additional` more entries fit without
    /// exceeding the load factor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::SetEntry;
    /// use rh_weak_table::WeakTable;
    ///
    /// let mut table: WeakTable<SetEntry<Weak<u64>>> = WeakTable::new();
    /// table.reserve(100);
    /// assert!(table.capacity() * 3 >= 100 * 4);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        if additional == 0 {
            return;
        }
        let required = self.populated.saturating_add(additional);
        let capacity = self.buckets.len();
        if capacity != 0 && !exceeds_load_factor(required, capacity) {
            return;
        }

        let mut new_capacity = capacity.max(DEFAULT_CAPACITY);
        while exceeds_load_factor(required, new_capacity) {
            new_capacity = new_capacity.checked_mul(2).expect("capacity overflow");
        }
        if new_capacity != capacity {
            self.resize(new_capacity);
        }
    }

    #[inline]
    fn maybe_grow(&mut self) {
        let capacity = self.buckets.len();
        if exceeds_load_factor(self.populated, capacity) {
            self.resize(capacity.checked_mul(2).expect("capacity overflow"));
        }
    }

    /// Moves every live entry into a fresh array of `new_capacity` buckets,
    /// dropping expired ones.
    #[cold]
    fn resize(&mut self, new_capacity: usize) {
        assert!(
            new_capacity > self.populated,
            "resize to {new_capacity} buckets cannot hold {} entries",
            self.populated
        );

        let mut old_buckets = core::mem::replace(&mut self.buckets, FixedVec::new(new_capacity));
        self.populated = 0;

        for bucket in old_buckets.iter_mut() {
            if let Some((hash, entry)) = bucket.take() {
                if !entry.is_expired() {
                    self.insert_hashed(hash, entry);
                }
            }
        }
    }

    /// Returns an iterator over the live entries, locked into their views.
    ///
    /// Buckets are visited in physical order. Liveness is checked when each
    /// bucket is reached, so an entry that expires mid-iteration is skipped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use std::rc::Weak;
    ///
    /// use rh_weak_table::SetEntry;
    /// use rh_weak_table::WeakTable;
    ///
    /// let mut table: WeakTable<SetEntry<Weak<i32>>> = WeakTable::new();
    /// let kept = Rc::new(1);
    /// table.insert(Rc::clone(&kept));
    /// table.insert(Rc::new(2));
    ///
    /// let values: Vec<i32> = table.iter().map(|rc| *rc).collect();
    /// assert_eq!(values, vec![1]);
    /// ```
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            buckets: self.buckets.iter(),
        }
    }

    /// Removes every entry, yielding the live ones in their owning form.
    ///
    /// The table is empty once the iterator is dropped, whether or not it was
    /// run to completion. If the iterator is leaked (e.g. with
    /// `mem::forget`), the entries it had not reached stay in the table and
    /// are still counted by `len`.
    pub fn drain(&mut self) -> Drain<'_, E> {
        let WeakTable {
            buckets, populated, ..
        } = self;
        Drain {
            buckets: buckets.iter_mut(),
            populated,
        }
    }

    /// Computes a histogram of probe distances over used buckets.
    ///
    /// Index `d` of the result counts buckets whose entry sits `d` slots past
    /// its home bucket. Expired entries are included.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> Vec<usize> {
        let capacity = self.buckets.len();
        let mut hist = Vec::new();
        for (pos, bucket) in self.buckets.iter().enumerate() {
            if !bucket.is_used() {
                continue;
            }
            let dist = probe_distance(capacity, pos, home_bucket(capacity, bucket.hash_code()));
            if hist.len() <= dist {
                hist.resize(dist + 1, 0);
            }
            hist[dist] += 1;
        }
        hist
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.buckets.len();
        let mut live_slots = 0;
        let mut expired_slots = 0;
        let mut max_probe_distance = 0;
        let mut total_distance = 0;

        for (pos, bucket) in self.buckets.iter().enumerate() {
            let Some(entry) = bucket.entry() else {
                continue;
            };
            if entry.is_expired() {
                expired_slots += 1;
            } else {
                live_slots += 1;
            }
            let dist = probe_distance(capacity, pos, home_bucket(capacity, bucket.hash_code()));
            max_probe_distance = max_probe_distance.max(dist);
            total_distance += dist;
        }

        let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f64 / d as f64 };
        DebugStats {
            populated: self.populated,
            capacity,
            live_slots,
            expired_slots,
            load_factor: ratio(self.populated, capacity),
            live_load_factor: ratio(live_slots, capacity),
            max_probe_distance,
            mean_probe_distance: ratio(total_distance, self.populated),
            total_bytes: capacity * core::mem::size_of::<Bucket<E>>(),
        }
    }

    /// Pretty-prints the probe-distance histogram horizontally using stdout.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_probe_histogram(&self) {
        let hist = self.probe_histogram();
        let max = hist.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.populated);

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = ['▏', '▎', '▍', '▌', '▋', '▊', '▉'];
            if units % 8 > 0 {
                bar.push(partial[units % 8 - 1]);
            }
            bar
        };

        for (dist, &count) in hist.iter().enumerate() {
            println!("{:>3} | {} ({})", dist, make_bar(count), count);
        }
    }
}

/// An iterator over the live entries of a [`WeakTable`].
///
/// This struct is created by [`WeakTable::iter`]. Each item is a freshly
/// locked view, so the payload stays alive for as long as the item is held.
pub struct Iter<'a, E> {
    buckets: core::slice::Iter<'a, Bucket<E>>,
}

impl<E> Clone for Iter<'_, E> {
    fn clone(&self) -> Self {
        Iter {
            buckets: self.buckets.clone(),
        }
    }
}

impl<'a, E: WeakEntry> Iterator for Iter<'a, E> {
    type Item = E::View<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for bucket in self.buckets.by_ref() {
            if let Some(view) = bucket.entry().and_then(|entry| entry.lock()) {
                return Some(view);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.buckets.len()))
    }
}

impl<'a, E: WeakEntry, S: BuildHasher> IntoIterator for &'a WeakTable<E, S> {
    type IntoIter = Iter<'a, E>;
    type Item = E::View<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A draining iterator over a [`WeakTable`].
///
/// This struct is created by [`WeakTable::drain`]. It yields the owning form
/// of every live entry; expired entries are dropped silently.
pub struct Drain<'a, E> {
    buckets: core::slice::IterMut<'a, Bucket<E>>,
    populated: &'a mut usize,
}

impl<E: WeakEntry> Iterator for Drain<'_, E> {
    type Item = E::Strong;

    fn next(&mut self) -> Option<Self::Item> {
        for bucket in self.buckets.by_ref() {
            let Some((_, entry)) = bucket.take() else {
                continue;
            };
            *self.populated -= 1;
            if let Some(strong) = entry.into_strong() {
                return Some(strong);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.buckets.len()))
    }
}

impl<E> Drop for Drain<'_, E> {
    fn drop(&mut self) {
        for bucket in self.buckets.by_ref() {
            if bucket.take().is_some() {
                *self.populated -= 1;
            }
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
    use core::hash::BuildHasherDefault;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::weak_entry::KeyEntry;
    use crate::weak_entry::SetEntry;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap_or(0),
                k1: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    /// Hashes every `u64` to itself, so tests can pick home buckets.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | b as u64;
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    type IdentityBuilder = BuildHasherDefault<IdentityHasher>;
    type IntSet<S = SipHashBuilder> = WeakTable<SetEntry<Weak<u64>>, S>;

    fn live(values: impl IntoIterator<Item = u64>) -> Vec<Rc<u64>> {
        values.into_iter().map(Rc::new).collect()
    }

    #[test]
    fn single_element_lifecycle() {
        let mut table: WeakTable<SetEntry<Weak<i32>>, SipHashBuilder> = WeakTable::new();

        let five = Rc::new(5);
        table.insert(Rc::clone(&five));

        assert!(table.contains(&5));
        assert!(!table.contains(&6));

        let actual: Vec<i32> = table.iter().map(|rc| *rc).collect();
        assert_eq!(actual, vec![5]);

        drop(five);

        assert!(!table.contains(&5));
        assert!(!table.contains(&6));
    }

    #[test]
    fn insert_and_find() {
        let mut table: IntSet = WeakTable::with_capacity(0);
        let owners = live(0..32);
        for owner in &owners {
            table.insert(Rc::clone(owner));
            assert!(table.contains(&**owner), "{:#?}", table);
        }

        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            assert!(table.contains(&k), "{:#?}", table);
            assert_eq!(table.get(&k).as_deref(), Some(&k));
        }
        assert!(!table.contains(&999));
    }

    #[test]
    fn grows_exactly_once_past_three_quarters() {
        let mut table: IntSet = WeakTable::with_capacity(8);
        let owners = live(0..7);

        for owner in owners.iter().take(6) {
            table.insert(Rc::clone(owner));
        }
        assert_eq!(table.capacity(), 8);

        table.insert(Rc::clone(&owners[6]));
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 7);

        for k in 0..7u64 {
            assert!(table.contains(&k), "{:#?}", table);
        }
    }

    #[test]
    fn duplicate_insert_replaces_in_place() {
        let mut table: WeakTable<KeyEntry<Weak<String>, i32>, SipHashBuilder> = WeakTable::new();
        let key = Rc::new("k".to_string());

        assert!(table.insert((Rc::clone(&key), 7)).is_none());
        let previous = table.insert((Rc::clone(&key), 11)).expect("key is live");
        assert_eq!(*previous.value(), 7);
        assert_eq!(table.len(), 1);

        let (locked, value) = table.get("k").unwrap();
        assert!(Rc::ptr_eq(&locked, &key));
        assert_eq!(*value, 11);
    }

    #[test]
    fn equal_key_from_new_owner_replaces_entry() {
        let mut table: IntSet = WeakTable::new();
        let first = Rc::new(3u64);
        let second = Rc::new(3u64);

        table.insert(Rc::clone(&first));
        assert!(table.insert(Rc::clone(&second)).is_some());
        assert_eq!(table.len(), 1);

        drop(first);
        assert!(table.contains(&3));
        assert!(Rc::ptr_eq(&table.get(&3).unwrap(), &second));
    }

    #[test]
    fn expired_slot_is_reclaimed_by_same_home_key() {
        let mut table: IntSet<IdentityBuilder> = WeakTable::with_capacity(8);
        let a = Rc::new(3u64);
        table.insert(Rc::clone(&a));
        drop(a);

        // 11 % 8 == 3, the same home bucket as 3.
        let b = Rc::new(11u64);
        table.insert(Rc::clone(&b));

        assert_eq!(table.len(), 1);
        assert!(!table.contains(&3));
        assert!(table.contains(&11));
        assert_eq!(table.probe_histogram(), vec![1]);
    }

    #[test]
    fn expired_slot_with_longer_chain_is_not_reclaimed_early() {
        let mut table: IntSet<IdentityBuilder> = WeakTable::with_capacity(16);
        let owners = live([0, 16, 32, 1]);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        // Buckets: 0 -> 0, 1 -> 16, 2 -> 32, 3 -> 1.
        let (dead, kept): (Vec<_>, Vec<_>) = owners.into_iter().partition(|o| **o == 32);
        drop(dead);

        // 2 has home bucket 2 and arrives there with distance 0; the expired 32 sits
        // at distance 2, and 1 probed past it.
        let two = Rc::new(2u64);
        table.insert(Rc::clone(&two));

        for owner in &kept {
            assert!(table.contains(&**owner), "{:#?}", table);
        }
        assert!(table.contains(&2), "{:#?}", table);
        assert!(!table.contains(&32));
    }

    #[test]
    fn len_is_upper_bound_until_resize() {
        let mut table: IntSet = WeakTable::with_capacity(64);
        let mut owners = live(0..20);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        owners.truncate(5);

        assert_eq!(table.len(), 20);
        assert_eq!(table.iter().count(), 5);

        table.remove_expired();
        assert_eq!(table.len(), 5);
        assert_eq!(table.capacity(), 64);
        for k in 0..5u64 {
            assert!(table.contains(&k));
        }
    }

    #[test]
    fn growth_drops_expired_entries() {
        let mut table: IntSet = WeakTable::with_capacity(8);
        let mut owners = live(0..6);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        owners.truncate(2);

        let extra = live(100..110);
        for owner in &extra {
            table.insert(Rc::clone(owner));
        }

        let stats = table.debug_stats();
        assert_eq!(stats.live_slots, 12);
        assert!(table.len() >= 12);
        for k in (0..2u64).chain(100..110) {
            assert!(table.contains(&k), "{:#?}", table);
        }
        for k in 2..6u64 {
            assert!(!table.contains(&k));
        }
    }

    #[test]
    fn remove_items() {
        let mut table: IntSet = WeakTable::with_capacity(0);
        let owners = live(0..8);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        assert_eq!(table.len(), 8);

        for k in [0u64, 3, 7] {
            let removed = table.remove(&k).expect("should remove");
            assert_eq!(removed.weak().upgrade().as_deref(), Some(&k));
        }
        assert_eq!(table.len(), 5);
        for k in [1u64, 2, 4, 5, 6] {
            assert!(table.contains(&k), "{:#?}", table);
        }
        assert!(table.remove(&1000).is_none());
    }

    #[test]
    fn remove_shifts_collided_entries_back() {
        let mut table: IntSet<IdentityBuilder> = WeakTable::with_capacity(16);
        let owners = live([5, 21, 37, 6]);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        assert_eq!(table.probe_histogram(), vec![1, 1, 2]);

        table.remove(&5);
        assert_eq!(table.probe_histogram(), vec![1, 2]);
        for k in [21u64, 37, 6] {
            assert!(table.contains(&k), "{:#?}", table);
        }
    }

    #[test]
    fn explicit_collision() {
        let mut table: IntSet<IdentityBuilder> = WeakTable::with_capacity(8);
        let owners = live((0..65).map(|k| k * 1024));
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        assert_eq!(table.len(), 65);
        for owner in &owners {
            assert!(table.contains(&**owner), "{:#?}", table);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let mut table: IntSet = WeakTable::new();
        let owners = live(0..100_000);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        assert_eq!(table.len(), 100_000);
        for k in 0..100_000u64 {
            assert!(table.contains(&k));
        }
        assert!(!exceeds_load_factor(table.len(), table.capacity()));
    }

    #[test]
    fn iter_and_drain() {
        let mut table: IntSet = WeakTable::new();
        let mut owners = live(10..20);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        owners.retain(|o| **o % 2 == 0);

        let mut collected: Vec<u64> = table.iter().map(|rc| *rc).collect();
        collected.sort();
        assert_eq!(collected, vec![10, 12, 14, 16, 18]);

        let drained: Vec<Rc<u64>> = table.drain().collect();
        assert_eq!(drained.len(), 5);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        for k in 10..20u64 {
            assert!(!table.contains(&k));
        }
    }

    #[test]
    fn dropped_drain_empties_table() {
        let mut table: IntSet = WeakTable::new();
        let owners = live(0..5);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        let mut drain = table.drain();
        assert!(drain.next().is_some());
        drop(drain);

        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
        assert_eq!(Rc::strong_count(&owners[0]), 1);
    }

    #[test]
    fn leaked_drain_leaves_table_consistent() {
        let mut table: IntSet = WeakTable::with_capacity(8);
        let owners = live(0..6);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        let capacity = table.capacity();

        core::mem::forget(table.drain());
        assert_eq!(table.len(), 6);
        assert_eq!(table.iter().count(), 6);
        for k in 0..6u64 {
            assert!(table.contains(&k));
        }

        let more = live(100..103);
        for owner in &more {
            table.insert(Rc::clone(owner));
        }
        assert!(table.capacity() > capacity);
        assert_eq!(table.len(), 9);
        assert_eq!(table.iter().count(), 9);
        for k in (0..6u64).chain(100..103) {
            assert!(table.contains(&k));
        }
    }

    #[test]
    fn partially_leaked_drain_counts_taken_entries() {
        let mut table: IntSet = WeakTable::new();
        let owners = live(0..5);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        let mut drain = table.drain();
        let taken = drain.next();
        assert!(taken.is_some());
        core::mem::forget(drain);

        assert_eq!(table.len(), 4);
        assert_eq!(table.iter().count(), 4);
        for owner in &owners {
            let in_table = table.iter().any(|rc| Rc::ptr_eq(&rc, owner));
            assert_eq!(table.contains(&**owner), in_table);
        }
    }

    #[test]
    fn iteration_does_not_extend_lifetimes() {
        let mut table: IntSet = WeakTable::new();
        let owner = Rc::new(1u64);
        table.insert(Rc::clone(&owner));

        let locked: Vec<Rc<u64>> = table.iter().collect();
        assert_eq!(Rc::strong_count(&owner), 2);
        drop(locked);
        assert_eq!(Rc::strong_count(&owner), 1);
        assert_eq!(Rc::weak_count(&owner), 1);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table: IntSet = WeakTable::with_capacity(32);
        let owners = live(0..10);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 32);
        assert_eq!(Rc::weak_count(&owners[0]), 0);
    }

    #[test]
    fn reserve_prevents_growth() {
        let mut table: IntSet = WeakTable::with_capacity(0);
        table.reserve(100);
        let capacity = table.capacity();
        assert!(capacity >= 134);

        let owners = live(0..100);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn reserve_zero_on_empty_table_does_not_allocate() {
        let mut table: IntSet = WeakTable::with_capacity(0);
        table.reserve(0);
        assert_eq!(table.capacity(), 0);
    }

    #[test]
    fn zero_capacity_grows_on_first_insert() {
        let mut table: IntSet = WeakTable::with_capacity(0);
        assert!(!table.contains(&1));

        let one = Rc::new(1u64);
        table.insert(Rc::clone(&one));
        assert_eq!(table.capacity(), DEFAULT_CAPACITY);
        assert!(table.contains(&1));
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn resize_below_len_panics() {
        let mut table: IntSet = WeakTable::with_capacity(8);
        let owners = live(0..4);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }
        table.resize(4);
    }

    #[test]
    fn clone_shares_payloads() {
        let mut table: WeakTable<SetEntry<Weak<String>>, SipHashBuilder> = WeakTable::new();
        let owners: Vec<Rc<String>> = ["a", "b", "c"]
            .iter()
            .map(|s| Rc::new(s.to_string()))
            .collect();
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        let cloned = table.clone();
        assert_eq!(cloned.len(), 3);
        assert!(cloned.contains("b"));
        assert_eq!(Rc::weak_count(&owners[1]), 2);

        drop(owners);
        assert!(!table.contains("b"));
        assert!(!cloned.contains("b"));
    }

    #[test]
    fn debug_marks_expired_buckets() {
        let mut table: IntSet<IdentityBuilder> = WeakTable::with_capacity(4);
        let kept = Rc::new(0u64);
        table.insert(Rc::clone(&kept));
        table.insert(Rc::new(2u64));

        let printed = alloc::format!("{:?}", table);
        assert!(printed.contains("00, .., xx, .."), "{printed}");
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    #[cfg(feature = "std")]
    fn histogram_output() {
        let mut table: IntSet = WeakTable::with_capacity(1 << 12);
        let owners = live(0..3000);
        for owner in &owners {
            table.insert(Rc::clone(owner));
        }

        table.print_probe_histogram();
        table.debug_stats().print();
    }
}
