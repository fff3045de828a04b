use alloc::{boxed::Box, vec::Vec};
use parking_lot::Mutex;

const MAX_PER_BUCKET: usize = 16;

/// Pool of fixed-length slot arrays for short argument lists.
///
/// Arrays with length in `1..=LIMIT` are kept in one bucket per length,
/// everything else is allocated on demand and dropped on return.
pub struct CappedArrayPool<T, const LIMIT: usize> {
    buckets: Mutex<Vec<Vec<Box<[Option<T>]>>>>,
}

impl<T, const LIMIT: usize> Default for CappedArrayPool<T, LIMIT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const LIMIT: usize> CappedArrayPool<T, LIMIT> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buckets: Mutex::new(Vec::new()),
        }
    }

    /// Rents an array of exactly `len` empty slots
    #[must_use]
    pub fn rent(&self, len: usize) -> Box<[Option<T>]> {
        if len == 0 {
            return Box::default();
        }
        if len <= LIMIT {
            if let Some(array) = self.buckets.lock().get_mut(len - 1).and_then(Vec::pop) {
                return array;
            }
        }
        (0..len).map(|_| None).collect()
    }

    pub fn give_back(&self, mut array: Box<[Option<T>]>) {
        let len = array.len();
        if len == 0 || len > LIMIT {
            return;
        }
        for slot in array.iter_mut() {
            *slot = None;
        }

        let mut buckets = self.buckets.lock();
        if buckets.len() < len {
            buckets.resize_with(len, Vec::new);
        }
        let bucket = &mut buckets[len - 1];
        if bucket.len() < MAX_PER_BUCKET {
            bucket.push(array);
        }
    }

    #[inline]
    #[must_use]
    pub fn retained(&self, len: usize) -> usize {
        match len {
            0 => 0,
            len => self.buckets.lock().get(len - 1).map_or(0, Vec::len),
        }
    }
}
