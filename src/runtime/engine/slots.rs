//! Generation-tagged storage for execution contexts

use slab::Slab;
use std::fmt;

use super::{EngineError, ExecutionHandle};

enum SlotState<T> {
    Idle(T),
    Running,
}

struct Slot<T> {
    generation: u32,
    state: SlotState<T>,
}

/// Slab of execution contexts addressed by [`ExecutionHandle`].
///
/// A context is checked out while it runs so that the engine can keep
/// creating new contexts (spawns) without aliasing the running one. Every
/// insertion draws a fresh generation, so reused slot indices never match
/// stale handles.
pub struct ExecutionSlots<T> {
    slab: Slab<Slot<T>>,
    next_generation: u32,
}

impl<T> ExecutionSlots<T> {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            slab: Slab::new(),
            next_generation: 0,
        }
    }

    /// Store a context and return its handle.
    pub fn insert(
        &mut self,
        value: T,
    ) -> Result<ExecutionHandle, EngineError> {
        let entry = self.slab.vacant_entry();
        let index = u32::try_from(entry.key()).map_err(|_| EngineError::Exhausted)?;
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        entry.insert(Slot {
            generation,
            state: SlotState::Idle(value),
        });
        Ok(ExecutionHandle::new(index, generation))
    }

    fn slot_mut(
        &mut self,
        handle: ExecutionHandle,
    ) -> Result<&mut Slot<T>, EngineError> {
        match self.slab.get_mut(handle.index() as usize) {
            Some(slot) if slot.generation == handle.generation() => Ok(slot),
            _ => Err(EngineError::UnknownHandle(handle)),
        }
    }

    /// Take a context out for running. The slot stays reserved.
    pub fn checkout(
        &mut self,
        handle: ExecutionHandle,
    ) -> Result<T, EngineError> {
        let slot = self.slot_mut(handle)?;
        match std::mem::replace(&mut slot.state, SlotState::Running) {
            SlotState::Idle(value) => Ok(value),
            SlotState::Running => Err(EngineError::Reentrant(handle)),
        }
    }

    /// Put a suspended context back.
    pub fn checkin(
        &mut self,
        handle: ExecutionHandle,
        value: T,
    ) -> Result<(), EngineError> {
        let slot = self.slot_mut(handle)?;
        slot.state = SlotState::Idle(value);
        Ok(())
    }

    /// Free a slot. Returns the context if it was not checked out.
    pub fn release(
        &mut self,
        handle: ExecutionHandle,
    ) -> Option<T> {
        self.slot_mut(handle).ok()?;
        match self.slab.remove(handle.index() as usize).state {
            SlotState::Idle(value) => Some(value),
            SlotState::Running => None,
        }
    }

    /// Whether `handle` refers to a stored context (idle or running).
    pub fn contains(
        &self,
        handle: ExecutionHandle,
    ) -> bool {
        self.slab
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.generation == handle.generation())
    }

    /// Number of stored contexts.
    #[inline]
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Whether no context is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }
}

impl<T> Default for ExecutionSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ExecutionSlots<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ExecutionSlots")
            .field("len", &self.slab.len())
            .field("next_generation", &self.next_generation)
            .finish()
    }
}
