//! Task registry
//!
//! Owns the pending and blocked sets, the toplevel forest, and a weak
//! index from execution handle to task. The sets hold strong references;
//! the index does not, so a task nobody references any more simply drops
//! out of it.

use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{trace, warn};

use super::task::{Task, TaskId, TaskRef, TaskState};
use crate::runtime::engine::ExecutionHandle;
use crate::runtime::weak::WeakRegistry;

/// Bookkeeping for every task of one scheduler.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    /// Next id to hand out.
    next_id: u64,
    /// Execution handle to task, weakly held.
    by_handle: WeakRegistry<ExecutionHandle, Task>,
    /// Tasks to resume next tick.
    pending: IndexMap<TaskId, TaskRef>,
    /// Tasks waiting to be woken.
    blocked: IndexMap<TaskId, TaskRef>,
    /// Tasks spawned by the host.
    toplevel: IndexMap<TaskId, TaskRef>,
    /// Successful Blocked -> Pending transitions.
    woken: u64,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created execution as a pending task.
    ///
    /// The task becomes a child of `parent`, or toplevel when there is none.
    pub fn register(
        &mut self,
        name: &str,
        handle: ExecutionHandle,
        parent: Option<&TaskRef>,
    ) -> TaskRef {
        self.next_id += 1;
        let task = Task::new(TaskId(self.next_id), name, handle, parent);

        self.by_handle.insert(handle, &task);
        self.pending.insert(task.id(), Rc::clone(&task));
        match parent {
            Some(parent) => parent.add_child(&task),
            None => {
                self.toplevel.insert(task.id(), Rc::clone(&task));
            }
        }

        trace!(task = %task, handle = %handle, "task spawned");
        task
    }

    /// Find the task running on `handle`, if it is still referenced.
    pub fn by_handle(
        &self,
        handle: ExecutionHandle,
    ) -> Option<TaskRef> {
        self.by_handle.lookup(&handle)
    }

    /// Find a live task by id.
    pub fn get(
        &self,
        id: TaskId,
    ) -> Option<TaskRef> {
        self.by_handle
            .iter()
            .find(|(_, task)| task.id() == id)
            .map(|(_, task)| task)
    }

    /// Copy of the pending set, in registry order.
    pub fn pending_snapshot(&self) -> Vec<TaskRef> {
        self.pending.values().cloned().collect()
    }

    /// Move a pending task to blocked. Returns whether it moved.
    pub(crate) fn block(
        &mut self,
        task: &TaskRef,
    ) -> bool {
        if !task.is_pending() {
            return false;
        }
        self.pending.swap_remove(&task.id());
        self.blocked.insert(task.id(), Rc::clone(task));
        task.set_state(TaskState::Blocked);
        trace!(task = %task, "task blocked");
        true
    }

    /// Move a blocked task back to pending. Waking a task that is not
    /// blocked does nothing and returns `false`.
    pub fn wake(
        &mut self,
        task: &TaskRef,
    ) -> bool {
        if !task.is_blocked() {
            warn!(task = %task, state = %task.state(), "ignoring wake of task that is not blocked");
            return false;
        }
        self.blocked.swap_remove(&task.id());
        self.pending.insert(task.id(), Rc::clone(task));
        task.set_state(TaskState::Pending);
        self.woken += 1;
        trace!(task = %task, "task woken");
        true
    }

    /// Wake a blocked task by id.
    pub fn wake_id(
        &mut self,
        id: TaskId,
    ) -> bool {
        match self.blocked.get(&id).cloned() {
            Some(task) => self.wake(&task),
            None => {
                warn!(task_id = %id, "ignoring wake of unknown or unblocked task");
                false
            }
        }
    }

    /// Mark a task dead. It leaves `blocked` at once; removal from `pending`
    /// is deferred to [`TaskRegistry::remove_dead_pending`] so the running
    /// tick's snapshot stays consistent.
    pub(crate) fn mark_dead(
        &mut self,
        task: &TaskRef,
    ) {
        task.set_state(TaskState::Dead);
        self.blocked.swap_remove(&task.id());
        trace!(task = %task, "task dead");
    }

    /// Drop dead tasks from `pending`. Returns how many were removed.
    pub(crate) fn remove_dead_pending(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, task| !task.is_dead());
        before - self.pending.len()
    }

    /// Drop dead tasks from `toplevel`, letting them be reclaimed.
    pub(crate) fn retire_dead_toplevel(&mut self) -> usize {
        let before = self.toplevel.len();
        self.toplevel.retain(|_, task| !task.is_dead());
        before - self.toplevel.len()
    }

    /// Forget index slots of reclaimed tasks.
    pub(crate) fn purge(&mut self) -> usize {
        self.by_handle.purge()
    }

    pub fn is_pending(
        &self,
        task: &Task,
    ) -> bool {
        self.pending.contains_key(&task.id())
    }

    pub fn is_blocked(
        &self,
        task: &Task,
    ) -> bool {
        self.blocked.contains_key(&task.id())
    }

    pub fn is_toplevel(
        &self,
        task: &Task,
    ) -> bool {
        self.toplevel.contains_key(&task.id())
    }

    pub fn pending(&self) -> Vec<TaskRef> {
        self.pending_snapshot()
    }

    pub fn blocked(&self) -> Vec<TaskRef> {
        self.blocked.values().cloned().collect()
    }

    pub fn toplevel(&self) -> Vec<TaskRef> {
        self.toplevel.values().cloned().collect()
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    #[inline]
    pub fn toplevel_len(&self) -> usize {
        self.toplevel.len()
    }

    /// Tasks still indexed by handle, i.e. referenced from somewhere.
    pub fn reachable_len(&self) -> usize {
        self.by_handle.len_live()
    }

    /// Whether any task is pending or blocked.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.pending.is_empty() || !self.blocked.is_empty()
    }

    /// Number of successful wakes so far.
    #[inline]
    pub fn woken(&self) -> u64 {
        self.woken
    }
}
