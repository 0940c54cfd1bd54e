//! Runtime system
//!
//! This module contains the cooperative task scheduler, the engine and
//! reactor bindings it is driven through, and the host façade.

pub mod engine;
pub mod host;
pub mod reactor;
pub mod scheduler;
pub mod weak;

pub use host::{RunSummary, Runtime, RuntimeError};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError, Task, TaskRef};
