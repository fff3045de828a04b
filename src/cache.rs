use alloc::{collections::btree_map::BTreeMap, collections::vec_deque::VecDeque, sync::Arc, vec::Vec};
use core::{mem, num::NonZeroUsize};
use parking_lot::{lock_api::GetThreadId as _, Condvar, Mutex, RawThreadId};

use crate::{any::Erased, any::TypeInfo, finalizer::BoxedCloneFinalizer, registry::RegistrationId};

/// Builders and waiters of every cache slot under construction.
/// A thread waits for at most one slot at a time, so the waits form chains.
struct WaitGraph {
    /// Slot address to the thread building it and the type being built
    builders: BTreeMap<usize, (NonZeroUsize, TypeInfo)>,
    /// Thread to the address of the slot it waits for
    waits: BTreeMap<NonZeroUsize, usize>,
}

impl WaitGraph {
    const fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
            waits: BTreeMap::new(),
        }
    }

    /// Types of the slots on the wait chain starting at `slot` if the chain ends in a slot built by `thread`.
    /// The first type is the one of `slot`, the last is the one `thread` builds.
    fn cycle(&self, thread: NonZeroUsize, mut slot: usize) -> Option<Vec<TypeInfo>> {
        let mut chain = Vec::new();
        for _ in 0..=self.builders.len() {
            let &(builder, type_info) = self.builders.get(&slot)?;
            chain.push(type_info);
            if builder == thread {
                return Some(chain);
            }
            slot = *self.waits.get(&builder)?;
        }
        None
    }
}

static WAITS: Mutex<WaitGraph> = Mutex::new(WaitGraph::new());

#[inline]
fn current_thread() -> NonZeroUsize {
    RawThreadId::INIT.nonzero_thread_id()
}

enum SlotState {
    Empty,
    Building,
    Ready(Erased),
}

/// Slot of one cached registration.
///
/// The instance is built without holding the slot lock.
/// Concurrent first resolutions wait for the builder, unless waiting would close a cycle of builders.
pub(crate) struct CacheSlot {
    state: Mutex<SlotState>,
    built: Condvar,
}

pub(crate) enum Acquired<'a> {
    Cached(Erased),
    /// The caller builds the instance and must finish the build, dropping it frees the slot for other callers
    Build(SlotBuild<'a>),
}

impl CacheSlot {
    const fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            built: Condvar::new(),
        }
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    /// Gets the cached instance or the right to build it.
    ///
    /// # Errors
    /// Returns the types on the wait chain if the slot is built by the current thread
    /// or by a thread that transitively waits for the current one.
    pub(crate) fn acquire(&self, type_info: TypeInfo) -> Result<Acquired<'_>, Vec<TypeInfo>> {
        let thread = current_thread();
        let mut state = self.state.lock();
        loop {
            if let SlotState::Ready(dependency) = &*state {
                return Ok(Acquired::Cached(dependency.clone()));
            }
            if let SlotState::Empty = &*state {
                *state = SlotState::Building;
                WAITS.lock().builders.insert(self.key(), (thread, type_info));
                return Ok(Acquired::Build(SlotBuild {
                    slot: self,
                    finished: false,
                }));
            }

            let mut graph = WAITS.lock();
            if let Some(chain) = graph.cycle(thread, self.key()) {
                return Err(chain);
            }
            graph.waits.insert(thread, self.key());
            drop(graph);

            self.built.wait(&mut state);
            WAITS.lock().waits.remove(&thread);
        }
    }

    #[cfg(test)]
    fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Ready(_))
    }
}

pub(crate) struct SlotBuild<'a> {
    slot: &'a CacheSlot,
    finished: bool,
}

impl SlotBuild<'_> {
    pub(crate) fn finish(mut self, dependency: Erased) {
        self.release(SlotState::Ready(dependency));
    }

    fn release(&mut self, next: SlotState) {
        self.finished = true;

        let mut state = self.slot.state.lock();
        *state = next;
        let key = self.slot.key();
        let mut graph = WAITS.lock();
        graph.builders.remove(&key);
        // Waiters of this slot are runnable again, their edges mustn't extend other chains
        graph.waits.retain(|_, waited| *waited != key);
        drop(graph);
        drop(state);

        self.slot.built.notify_all();
    }
}

impl Drop for SlotBuild<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release(SlotState::Empty);
        }
    }
}

pub(crate) struct Cache {
    map: BTreeMap<RegistrationId, Arc<CacheSlot>>,
    resolved: ResolvedSet,
}

impl Cache {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            resolved: ResolvedSet::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn slot(&mut self, id: RegistrationId) -> Arc<CacheSlot> {
        self.map.entry(id).or_insert_with(|| Arc::new(CacheSlot::new())).clone()
    }


    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    /// Drops every cached instance and hands out the instances to finalize
    #[must_use]
    pub(crate) fn take(&mut self) -> ResolvedSet {
        self.map.clear();
        mem::take(&mut self.resolved)
    }

    #[inline]
    #[must_use]
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

pub(crate) struct Resolved {
    pub(crate) type_info: TypeInfo,
    pub(crate) dependency: Erased,
    pub(crate) finalizer: BoxedCloneFinalizer,
}

#[derive(Default)]
pub(crate) struct ResolvedSet(pub(crate) VecDeque<Resolved>);

impl ResolvedSet {
    pub(crate) const fn new() -> Self {
        Self(VecDeque::new())
    }

    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }

    /// Next instance to finalize, the most recently cached goes first
    pub(crate) fn pop(&mut self) -> Option<Resolved> {
        self.0.pop_back()
    }
}
