#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    } else {
        compile_error!("either the `foldhash` or the `std` feature must be enabled");
    }
}

/// A heap array whose length is fixed at construction.
pub mod fixed_vec;

pub mod weak;

pub mod weak_entry;

/// The Robin Hood table underneath every collection in this crate.
pub mod weak_table;

/// A set of weakly held elements.
///
/// This module provides a `WeakHashSet` that wraps the `WeakTable` and
/// forgets elements once their last strong pointer is dropped.
pub mod weak_hash_set;

/// A map with weakly held keys.
pub mod weak_key_hash_map;

/// A map with weakly held values.
pub mod weak_value_hash_map;

/// A map whose keys and values are both weakly held.
pub mod weak_weak_hash_map;

pub use fixed_vec::FixedVec;
pub use fixed_vec::OutOfRange;
pub use weak::WeakElement;
pub use weak::WeakKey;
pub use weak_entry::BothEntry;
pub use weak_entry::KeyEntry;
pub use weak_entry::SetEntry;
pub use weak_entry::ValueEntry;
pub use weak_entry::WeakEntry;
pub use weak_hash_set::WeakHashSet;
pub use weak_key_hash_map::WeakKeyHashMap;
#[cfg(any(test, feature = "stats"))]
pub use weak_table::DebugStats;
pub use weak_table::WeakTable;
pub use weak_value_hash_map::WeakValueHashMap;
pub use weak_weak_hash_map::WeakWeakHashMap;
