use alloc::{collections::BinaryHeap, sync::Arc, vec::Vec};
use core::cmp::Reverse;
use parking_lot::{Mutex, ReentrantMutex};

/// Slot table with stable indices.
///
/// Removing an item leaves a tombstone, so indices of the other items never shift,
/// and the next [`FreeList::add`] reuses the lowest tombstone.
/// Writers serialize on the gate supplied by the owner and touch only the slot they change.
/// Readers iterate a [`FreeListSnapshot`] without taking the gate.
pub struct FreeList<T> {
    gate: Arc<ReentrantMutex<()>>,
    core: Mutex<Core<T>>,
}

struct Core<T> {
    slots: Vec<Arc<Slot<T>>>,
    free: BinaryHeap<Reverse<usize>>,
    len: usize,
}

struct Slot<T> {
    cell: Mutex<Cell<T>>,
}

struct Cell<T> {
    /// Bumped on every add and remove, so a snapshot can tell whether the item it saw is still there
    generation: u64,
    item: Option<T>,
}

impl<T> Slot<T> {
    fn occupied(item: T) -> Self {
        Self {
            cell: Mutex::new(Cell {
                generation: 0,
                item: Some(item),
            }),
        }
    }
}

impl<T: Clone> FreeList<T> {
    #[inline]
    #[must_use]
    pub fn new(gate: Arc<ReentrantMutex<()>>) -> Self {
        Self {
            gate,
            core: Mutex::new(Core {
                slots: Vec::new(),
                free: BinaryHeap::new(),
                len: 0,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn gate(&self) -> &Arc<ReentrantMutex<()>> {
        &self.gate
    }

    pub fn add(&self, item: T) -> usize {
        let _gate = self.gate.lock();
        let mut core = self.core.lock();
        core.len += 1;

        match core.free.pop() {
            Some(Reverse(index)) => {
                let mut cell = core.slots[index].cell.lock();
                cell.generation += 1;
                cell.item = Some(item);
                index
            }
            None => {
                core.slots.push(Arc::new(Slot::occupied(item)));
                core.slots.len() - 1
            }
        }
    }

    /// Tombstones the slot and returns its item, `None` if the slot is already free
    pub fn remove(&self, index: usize) -> Option<T> {
        let _gate = self.gate.lock();
        let mut core = self.core.lock();

        let item = {
            let mut cell = core.slots.get(index)?.cell.lock();
            let item = cell.item.take()?;
            cell.generation += 1;
            item
        };
        core.free.push(Reverse(index));
        core.len -= 1;
        Some(item)
    }

    /// Captures the occupied slots.
    /// Items removed or replaced afterwards are skipped by the snapshot, items added afterwards aren't seen.
    #[must_use]
    pub fn snapshot(&self) -> FreeListSnapshot<T> {
        let core = self.core.lock();
        let entries = core
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let cell = slot.cell.lock();
                cell.item.is_some().then(|| Entry {
                    index,
                    slot: slot.clone(),
                    generation: cell.generation,
                })
            })
            .collect();

        FreeListSnapshot {
            entries,
            high_water_mark: core.slots.len(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.lock().len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry<T> {
    index: usize,
    slot: Arc<Slot<T>>,
    generation: u64,
}

/// View of the slots occupied at the moment it was taken
pub struct FreeListSnapshot<T> {
    entries: Vec<Entry<T>>,
    high_water_mark: usize,
}

impl<T: Clone> FreeListSnapshot<T> {
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.iter_indexed().map(|(_, item)| item)
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.entries.iter().filter_map(|entry| {
            let cell = entry.slot.cell.lock();
            if cell.generation != entry.generation {
                return None;
            }
            cell.item.clone().map(|item| (entry.index, item))
        })
    }

    /// Index after the last slot ever used
    #[inline]
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}
