//! Task definitions for the scheduler.
//!
//! A [`Task`] is the bookkeeping record for one cooperative thread of script
//! execution: its name, the handle of its execution context, where it sits
//! in the spawn tree, and its scheduling state.

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

use crate::runtime::engine::ExecutionHandle;

/// Shared, single-threaded reference to a task.
pub type TaskRef = Rc<Task>;

/// Unique task identifier within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Task state. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to be resumed on the next tick.
    Pending,
    /// Suspended until something external wakes it.
    Blocked,
    /// Finished. Never resumed again.
    Dead,
}

impl TaskState {
    /// Lowercase name, as scripts see it.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Blocked => "blocked",
            TaskState::Dead => "dead",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a task exposes to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Name,
    Parent,
    Children,
    State,
}

/// Invalid field access on a task object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFieldError {
    #[error("No field '{field}' on {task}")]
    Missing { field: String, task: String },

    #[error("Cannot set field '{field}' on {task}")]
    ReadOnly { field: String, task: String },
}

/// A cooperatively scheduled unit of script execution.
pub struct Task {
    /// Registry-unique id, also the opaque identity in the rendered form.
    id: TaskId,
    /// Name given at spawn time.
    name: String,
    /// Execution context owned by the engine.
    handle: ExecutionHandle,
    /// Spawning task. `None` for toplevel tasks.
    parent: Option<Weak<Task>>,
    /// Tasks spawned by this one.
    children: RefCell<IndexMap<TaskId, TaskRef>>,
    /// Scheduling state.
    state: Cell<TaskState>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        name: &str,
        handle: ExecutionHandle,
        parent: Option<&TaskRef>,
    ) -> TaskRef {
        Rc::new(Self {
            id,
            name: name.to_string(),
            handle,
            parent: parent.map(Rc::downgrade),
            children: RefCell::new(IndexMap::new()),
            state: Cell::new(TaskState::Pending),
        })
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the execution handle.
    #[inline]
    pub fn handle(&self) -> ExecutionHandle {
        self.handle
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    #[inline]
    pub(crate) fn set_state(
        &self,
        state: TaskState,
    ) {
        self.state.set(state);
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.state() == TaskState::Blocked
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.state() == TaskState::Dead
    }

    /// Whether the task was spawned by the host rather than by another task.
    #[inline]
    pub fn is_toplevel(&self) -> bool {
        self.parent.is_none()
    }

    /// The spawning task, if it is still alive.
    pub fn parent(&self) -> Option<TaskRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Snapshot of the children, in spawn order.
    pub fn children(&self) -> Vec<TaskRef> {
        self.children.borrow().values().cloned().collect()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Whether `child` was spawned by this task.
    pub fn has_child(
        &self,
        child: &Task,
    ) -> bool {
        self.children.borrow().contains_key(&child.id)
    }

    pub(crate) fn add_child(
        &self,
        child: &TaskRef,
    ) {
        self.children
            .borrow_mut()
            .insert(child.id(), Rc::clone(child));
    }

    /// Resolve a script-visible field name.
    pub fn field(
        &self,
        name: &str,
    ) -> Result<TaskField, TaskFieldError> {
        match name {
            "name" => Ok(TaskField::Name),
            "parent" => Ok(TaskField::Parent),
            "children" => Ok(TaskField::Children),
            "state" => Ok(TaskField::State),
            _ => Err(TaskFieldError::Missing {
                field: name.to_string(),
                task: self.to_string(),
            }),
        }
    }

    /// Tasks are read-only to scripts; every write is an error.
    pub fn set_field(
        &self,
        name: &str,
    ) -> TaskFieldError {
        TaskFieldError::ReadOnly {
            field: name.to_string(),
            task: self.to_string(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task '{}': {}", self.name, self.id)
    }
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("handle", &self.handle)
            .field("children", &self.child_count())
            .finish()
    }
}
