//! Weak handle capabilities.
//!
//! A weak handle observes a value without keeping it alive. The tables in
//! this crate only ever store weak handles, so they need a uniform way to
//! create one from a strong pointer, to upgrade it again, and to tell whether
//! the value behind it is gone. [`WeakElement`] describes that, and
//! [`WeakKey`] adds the key a weak handle is hashed and compared by.
//!
//! Both traits are implemented for [`alloc::rc::Weak`] and
//! [`alloc::sync::Weak`].

use alloc::rc;
use alloc::sync;
use core::hash::Hash;

/// A weak handle that can be created from, and upgraded to, a strong pointer.
pub trait WeakElement {
    /// The owning pointer type this handle observes.
    type Strong;

    /// Creates a weak handle observing `view`.
    fn new(view: &Self::Strong) -> Self;

    /// Upgrades the handle, or returns `None` if the value has been dropped.
    fn view(&self) -> Option<Self::Strong>;

    /// Returns `true` if the observed value has been dropped.
    ///
    /// Expiry is only ever observed, never cached: a handle that is live now
    /// may be expired on the next call.
    fn is_expired(&self) -> bool {
        self.view().is_none()
    }
}

/// A weak handle whose strong form carries a hashable key.
pub trait WeakKey: WeakElement {
    /// The key type compared and hashed by the tables.
    type Key: ?Sized + Eq + Hash;

    /// Borrows the key out of a strong pointer.
    fn view_key(view: &Self::Strong) -> &Self::Key;

    /// Applies `f` to the key of the observed value, or returns `None` if the
    /// value has been dropped.
    fn with_key<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Self::Key) -> R,
    {
        self.view().map(|view| f(Self::view_key(&view)))
    }
}

impl<T: ?Sized> WeakElement for rc::Weak<T> {
    type Strong = rc::Rc<T>;

    fn new(view: &Self::Strong) -> Self {
        rc::Rc::downgrade(view)
    }

    fn view(&self) -> Option<Self::Strong> {
        self.upgrade()
    }

    fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }
}

impl<T: ?Sized + Eq + Hash> WeakKey for rc::Weak<T> {
    type Key = T;

    fn view_key(view: &Self::Strong) -> &Self::Key {
        view
    }
}

impl<T: ?Sized> WeakElement for sync::Weak<T> {
    type Strong = sync::Arc<T>;

    fn new(view: &Self::Strong) -> Self {
        sync::Arc::downgrade(view)
    }

    fn view(&self) -> Option<Self::Strong> {
        self.upgrade()
    }

    fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }
}

impl<T: ?Sized + Eq + Hash> WeakKey for sync::Weak<T> {
    type Key = T;

    fn view_key(view: &Self::Strong) -> &Self::Key {
        view
    }
}
