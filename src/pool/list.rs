use alloc::vec::Vec;
use core::{
    mem,
    ops::{Deref, DerefMut},
};
use parking_lot::Mutex;

const MAX_RETAINED: usize = 32;

/// Pool of growable buffers.
/// Released buffers are cleared and handed out again by the next [`ListPool::get`].
pub struct ListPool<T> {
    lists: Mutex<Vec<Vec<T>>>,
}

impl<T> Default for ListPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListPool<T> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lists: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Vec<T> {
        self.lists.lock().pop().unwrap_or_default()
    }

    /// Gets a buffer that goes back to the pool when the guard is dropped
    #[inline]
    #[must_use]
    pub fn get_scoped(&self) -> PooledList<'_, T> {
        PooledList {
            pool: self,
            list: self.get(),
        }
    }

    pub fn release(&self, mut list: Vec<T>) {
        list.clear();

        let mut lists = self.lists.lock();
        if lists.len() < MAX_RETAINED {
            lists.push(list);
        }
    }

    #[inline]
    #[must_use]
    pub fn retained(&self) -> usize {
        self.lists.lock().len()
    }
}

pub struct PooledList<'a, T> {
    pool: &'a ListPool<T>,
    list: Vec<T>,
}

impl<T> PooledList<'_, T> {
    /// Takes the buffer out, so it won't be returned to the pool
    #[inline]
    #[must_use]
    pub fn into_inner(mut self) -> Vec<T> {
        mem::take(&mut self.list)
    }
}

impl<T> Deref for PooledList<'_, T> {
    type Target = Vec<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.list
    }
}

impl<T> DerefMut for PooledList<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.list
    }
}

impl<T> Drop for PooledList<'_, T> {
    fn drop(&mut self) {
        let list = mem::take(&mut self.list);
        if list.capacity() != 0 {
            self.pool.release(list);
        }
    }
}
