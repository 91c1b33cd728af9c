use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ops::DerefMut;
use core::ptr::NonNull;

/// Error returned by the checked accessors of [`FixedVec`] when the index is
/// not less than the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    /// The requested index.
    pub index: usize,
    /// The length of the vector at the time of the access.
    pub len: usize,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed_vec index {} out of range for length {}",
            self.index, self.len
        )
    }
}

impl core::error::Error for OutOfRange {}

/// A heap array of exactly `len` elements.
///
/// The buffer is allocated once when the vector is constructed and released
/// once, when the vector is dropped or [`clear`]ed. There is no way to grow or
/// shrink a `FixedVec` in place: a capacity change means building a new one.
/// `FixedVec` is deliberately not `Clone`. Moving it transfers the buffer, and
/// `core::mem::take` leaves an empty, zero-length vector in its place.
///
/// [`clear`]: FixedVec::clear
///
/// # Examples
///
/// ```rust
/// use rh_weak_table::FixedVec;
///
/// let mut v: FixedVec<u32> = FixedVec::new(10);
/// assert_eq!(v.len(), 10);
/// v[1] += 1;
/// assert_eq!(v[0], 0);
/// assert_eq!(v[1], 1);
/// assert!(v.at(12).is_err());
/// ```
pub struct FixedVec<T> {
    ptr: NonNull<T>,
    len: usize,
    _phantom: PhantomData<T>,
}

// SAFETY: `FixedVec<T>` owns its elements exactly like `Box<[T]>` does.
unsafe impl<T: Send> Send for FixedVec<T> {}
// SAFETY: Shared access only hands out `&T`.
unsafe impl<T: Sync> Sync for FixedVec<T> {}

impl<T> Default for FixedVec<T> {
    fn default() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            _phantom: PhantomData,
        }
    }
}

impl<T: Debug> Debug for FixedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Default> FixedVec<T> {
    /// Creates a vector of `len` default-constructed elements.
    pub fn new(len: usize) -> Self {
        Self::from_fn(len, |_| T::default())
    }
}

impl<T: Clone> FixedVec<T> {
    /// Creates a vector of `len` clones of `element`.
    pub fn from_elem(len: usize, element: &T) -> Self {
        Self::from_fn(len, |_| element.clone())
    }
}

impl<T> FixedVec<T> {
    /// Creates a vector of `len` elements, initializing slot `i` with `f(i)`.
    ///
    /// If `f` panics, the elements constructed so far and the buffer are
    /// leaked.
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> T) -> Self {
        let layout = Layout::array::<T>(len).expect("allocation size overflow");
        if layout.size() == 0 {
            // Zero-sized types still need their values constructed.
            for i in 0..len {
                core::mem::forget(f(i));
            }
            return Self {
                ptr: NonNull::dangling(),
                len,
                _phantom: PhantomData,
            };
        }

        // SAFETY: We have validated that the layout size is non-zero, and we handle
        // allocation errors if `alloc` returns null. Each slot in `0..len` is written
        // exactly once before the vector is returned.
        unsafe {
            let raw_alloc = alloc::alloc::alloc(layout);
            if raw_alloc.is_null() {
                handle_alloc_error(layout);
            }

            let ptr = raw_alloc.cast::<T>();
            for i in 0..len {
                ptr.add(i).write(f(i));
            }

            Self {
                ptr: NonNull::new_unchecked(ptr),
                len,
                _phantom: PhantomData,
            }
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a reference to the element at `index`, or [`OutOfRange`] if
    /// `index >= len`.
    pub fn at(&self, index: usize) -> Result<&T, OutOfRange> {
        self.as_slice().get(index).ok_or(OutOfRange {
            index,
            len: self.len,
        })
    }

    /// Returns a mutable reference to the element at `index`, or
    /// [`OutOfRange`] if `index >= len`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, OutOfRange> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(OutOfRange { index, len })
    }

    /// Returns the elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is either dangling with `len` zero-sized or zero elements, or
        // points to `len` initialized elements owned by `self`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: See `as_slice`; `&mut self` guarantees exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Drops every element and replaces the buffer with a zero-length one.
    pub fn clear(&mut self) {
        if self.len == 0 {
            return;
        }
        self.release();
        self.ptr = NonNull::dangling();
        self.len = 0;
    }

    fn release(&mut self) {
        // SAFETY: All `len` elements are initialized and dropped exactly once here;
        // callers reset `ptr`/`len` afterwards or are in `drop`. The allocation was
        // made with this exact layout in `from_fn`.
        unsafe {
            core::ptr::drop_in_place(self.as_mut_slice());

            let layout = Layout::array::<T>(self.len).expect("allocation size overflow");
            if layout.size() != 0 {
                alloc::alloc::dealloc(self.ptr.as_ptr().cast(), layout);
            }
        }
    }
}

impl<T> Drop for FixedVec<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Deref for FixedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for FixedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, T> IntoIterator for &'a FixedVec<T> {
    type IntoIter = core::slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut FixedVec<T> {
    type IntoIter = core::slice::IterMut<'a, T>;
    type Item = &'a mut T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use core::cell::Cell;

    use super::*;

    struct DropCounter<'a> {
        drops: &'a Cell<usize>,
    }

    impl Drop for DropCounter<'_> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn default_construction() {
        let v: FixedVec<i32> = FixedVec::default();
        assert_eq!(v.len(), 0);
        assert!(v.is_empty());
        assert_eq!(v.at(0), Err(OutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn ten_zeros() {
        let mut v: FixedVec<i32> = FixedVec::new(10);

        assert_eq!(v.len(), 10);
        assert_eq!(v[0], 0);
        assert_eq!(v[1], 0);

        v[1] += 1;

        assert_eq!(v[0], 0);
        assert_eq!(v[1], 1);

        assert_eq!(v.at(12), Err(OutOfRange { index: 12, len: 10 }));
        assert_eq!(v.at(9), Ok(&0));
    }

    #[test]
    fn from_elem_clones_value() {
        let v = FixedVec::from_elem(3, &"x".to_string());
        let collected: alloc::vec::Vec<String> = v.iter().cloned().collect();
        assert_eq!(collected, ["x", "x", "x"]);
    }

    #[test]
    fn at_mut_checks_bounds() {
        let mut v: FixedVec<u8> = FixedVec::from_fn(4, |i| i as u8);
        *v.at_mut(3).unwrap() = 42;
        assert_eq!(v[3], 42);
        assert!(v.at_mut(4).is_err());
    }

    #[test]
    fn out_of_range_display() {
        let err = OutOfRange { index: 5, len: 2 };
        assert_eq!(err.to_string(), "fixed_vec index 5 out of range for length 2");
    }

    #[test]
    fn drop_runs_once_per_element() {
        let drops = Cell::new(0);
        {
            let _v = FixedVec::from_fn(5, |_| DropCounter { drops: &drops });
        }
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn clear_releases_elements() {
        let drops = Cell::new(0);
        let mut v = FixedVec::from_fn(3, |_| DropCounter { drops: &drops });
        v.clear();
        assert_eq!(drops.get(), 3);
        assert!(v.is_empty());

        v.clear();
        drop(v);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn take_leaves_empty_source() {
        let shared = Rc::new(7);
        let mut v = FixedVec::from_elem(4, &shared);
        assert_eq!(Rc::strong_count(&shared), 5);

        let moved = core::mem::take(&mut v);
        assert!(v.is_empty());
        assert_eq!(moved.len(), 4);
        assert_eq!(Rc::strong_count(&shared), 5);

        drop(moved);
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn zero_sized_elements() {
        let v: FixedVec<()> = FixedVec::new(100);
        assert_eq!(v.len(), 100);
        assert_eq!(v.at(99), Ok(&()));
        assert!(v.at(100).is_err());
    }
}
