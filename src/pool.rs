//! Allocation-reducing primitives used on resolution hot paths.

mod array;
mod free_list;
mod list;

pub use array::CappedArrayPool;
pub use free_list::{FreeList, FreeListSnapshot};
pub use list::{ListPool, PooledList};
