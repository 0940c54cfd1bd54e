//! Script values

use std::fmt;
use std::rc::Rc;

use super::compiler::Function;
use super::vm::NativeFn;
use crate::runtime::scheduler::{TaskField, TaskRef};

/// A builtin callable from scripts.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        func: NativeFn,
    ) -> Self {
        Self { name, func }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A dynamically typed script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Function(Rc<Function>),
    Native(NativeFunction),
    Task(TaskRef),
    /// Read-only list, e.g. `task.children`.
    List(Rc<Vec<Value>>),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Type name as `type()` reports it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Task(_) => "task",
            Value::List(_) => "list",
        }
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskRef> {
        match self {
            Value::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Read a task field as a script value.
    pub fn task_field(
        task: &TaskRef,
        field: TaskField,
    ) -> Value {
        match field {
            TaskField::Name => Value::string(task.name()),
            TaskField::Parent => task.parent().map(Value::Task).unwrap_or(Value::Nil),
            TaskField::Children => {
                Value::List(Rc::new(task.children().into_iter().map(Value::Task).collect()))
            }
            TaskField::State => Value::string(task.state().as_str()),
        }
    }
}

impl PartialEq for Value {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Task(a), Value::Task(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::Function(function) => write!(f, "function: {}", function.display_name()),
            Value::Native(native) => write!(f, "builtin: {}", native.name),
            Value::Task(task) => write!(f, "{}", task),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Integral numbers print without a fractional part.
fn fmt_number(
    n: f64,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<TaskRef> for Value {
    fn from(task: TaskRef) -> Self {
        Value::Task(task)
    }
}
