//! Entries stored by [`WeakTable`](crate::WeakTable).
//!
//! The table itself never looks inside an entry. It asks the entry for its
//! key (which fails once the entry has expired), whether it has expired, and
//! how to lock it into a usable view. [`WeakEntry`] is that contract; the four
//! entry types below select at the type level which parts of an element are
//! held weakly.

use core::hash::Hash;

use crate::weak::WeakElement;
use crate::weak::WeakKey;

/// An element a [`WeakTable`](crate::WeakTable) can store.
pub trait WeakEntry: Sized {
    /// The owning form accepted by `insert`.
    type Strong;

    /// The locked form handed out by lookups and iteration.
    type View<'a>
    where
        Self: 'a;

    /// The key entries are hashed and compared by.
    type Key: ?Sized + Eq + Hash;

    /// Converts an owning element into its stored form.
    fn from_strong(strong: Self::Strong) -> Self;

    /// Borrows the key out of an owning element.
    fn strong_key(strong: &Self::Strong) -> &Self::Key;

    /// Returns `true` once any weakly held part of the entry has been dropped.
    fn is_expired(&self) -> bool;

    /// Applies `f` to the entry's key, or returns `None` if the entry has
    /// expired.
    fn with_key<R>(&self, f: impl FnOnce(&Self::Key) -> R) -> Option<R>;

    /// Locks the entry, or returns `None` if it has expired.
    fn lock(&self) -> Option<Self::View<'_>>;

    /// Consumes the entry back into its owning form, or returns `None` if it
    /// has expired.
    fn into_strong(self) -> Option<Self::Strong>;
}

/// A set element: the element itself is the weakly held key.
#[derive(Clone, Debug)]
pub struct SetEntry<T>(T);

impl<T: WeakKey> SetEntry<T> {
    /// Returns the stored weak handle.
    pub fn weak(&self) -> &T {
        &self.0
    }
}

impl<T: WeakKey> WeakEntry for SetEntry<T> {
    type Key = T::Key;
    type Strong = T::Strong;
    type View<'a>
        = T::Strong
    where
        Self: 'a;

    fn from_strong(strong: Self::Strong) -> Self {
        SetEntry(T::new(&strong))
    }

    fn strong_key(strong: &Self::Strong) -> &Self::Key {
        T::view_key(strong)
    }

    fn is_expired(&self) -> bool {
        self.0.is_expired()
    }

    fn with_key<R>(&self, f: impl FnOnce(&Self::Key) -> R) -> Option<R> {
        self.0.with_key(f)
    }

    fn lock(&self) -> Option<Self::View<'_>> {
        self.0.view()
    }

    fn into_strong(self) -> Option<Self::Strong> {
        self.0.view()
    }
}

/// A map entry with a weakly held key and a strongly held value.
#[derive(Clone, Debug)]
pub struct KeyEntry<K, V> {
    key: K,
    value: V,
}

impl<K, V> KeyEntry<K, V> {
    /// Returns the stored weak key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the value mutably.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Consumes the entry, returning the value.
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<K: WeakKey, V> WeakEntry for KeyEntry<K, V> {
    type Key = K::Key;
    type Strong = (K::Strong, V);
    type View<'a>
        = (K::Strong, &'a V)
    where
        Self: 'a;

    fn from_strong((key, value): Self::Strong) -> Self {
        KeyEntry {
            key: K::new(&key),
            value,
        }
    }

    fn strong_key(strong: &Self::Strong) -> &Self::Key {
        K::view_key(&strong.0)
    }

    fn is_expired(&self) -> bool {
        self.key.is_expired()
    }

    fn with_key<R>(&self, f: impl FnOnce(&Self::Key) -> R) -> Option<R> {
        self.key.with_key(f)
    }

    fn lock(&self) -> Option<Self::View<'_>> {
        self.key.view().map(|key| (key, &self.value))
    }

    fn into_strong(self) -> Option<Self::Strong> {
        let key = self.key.view()?;
        Some((key, self.value))
    }
}

/// A map entry with a strongly held key and a weakly held value.
#[derive(Clone, Debug)]
pub struct ValueEntry<K, V> {
    key: K,
    value: V,
}

impl<K, V> ValueEntry<K, V> {
    /// Returns the key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the stored weak value.
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<K: Eq + Hash, V: WeakElement> WeakEntry for ValueEntry<K, V> {
    type Key = K;
    type Strong = (K, V::Strong);
    type View<'a>
        = (&'a K, V::Strong)
    where
        Self: 'a;

    fn from_strong((key, value): Self::Strong) -> Self {
        ValueEntry {
            key,
            value: V::new(&value),
        }
    }

    fn strong_key(strong: &Self::Strong) -> &Self::Key {
        &strong.0
    }

    fn is_expired(&self) -> bool {
        self.value.is_expired()
    }

    fn with_key<R>(&self, f: impl FnOnce(&Self::Key) -> R) -> Option<R> {
        if self.value.is_expired() {
            return None;
        }
        Some(f(&self.key))
    }

    fn lock(&self) -> Option<Self::View<'_>> {
        self.value.view().map(|value| (&self.key, value))
    }

    fn into_strong(self) -> Option<Self::Strong> {
        let value = self.value.view()?;
        Some((self.key, value))
    }
}

/// A map entry whose key and value are both weakly held. The entry expires as
/// soon as either side does.
#[derive(Clone, Debug)]
pub struct BothEntry<K, V> {
    key: K,
    value: V,
}

impl<K, V> BothEntry<K, V> {
    /// Returns the stored weak key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the stored weak value.
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<K: WeakKey, V: WeakElement> WeakEntry for BothEntry<K, V> {
    type Key = K::Key;
    type Strong = (K::Strong, V::Strong);
    type View<'a>
        = (K::Strong, V::Strong)
    where
        Self: 'a;

    fn from_strong((key, value): Self::Strong) -> Self {
        BothEntry {
            key: K::new(&key),
            value: V::new(&value),
        }
    }

    fn strong_key(strong: &Self::Strong) -> &Self::Key {
        K::view_key(&strong.0)
    }

    fn is_expired(&self) -> bool {
        self.key.is_expired() || self.value.is_expired()
    }

    fn with_key<R>(&self, f: impl FnOnce(&Self::Key) -> R) -> Option<R> {
        if self.value.is_expired() {
            return None;
        }
        self.key.with_key(f)
    }

    fn lock(&self) -> Option<Self::View<'_>> {
        let key = self.key.view()?;
        let value = self.value.view()?;
        Some((key, value))
    }

    fn into_strong(self) -> Option<Self::Strong> {
        self.lock()
    }
}
