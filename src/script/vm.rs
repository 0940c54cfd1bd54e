//! Resumable stack VM
//!
//! Every execution context is a [`Fiber`]: a value stack plus a stack of
//! call frames with saved instruction pointers. Suspending a task simply
//! returns from the dispatch loop with the fiber intact; resuming re-enters
//! the loop at the saved frame. No native stack is ever switched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::trace;

use super::builtins;
use super::compiler::{Function, FunctionKind, Op};
use super::errors::CompileError;
use super::value::{NativeFunction, Value};
use crate::runtime::engine::{
    EngineError, ExecutionHandle, ExecutionSlots, ResumeOutcome, ScriptEngine, ScriptError,
    SuspendReason, TaskHost, UsageError,
};
use crate::runtime::scheduler::TaskRef;

/// Interpreter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Deepest call stack a fiber may build
    pub max_call_depth: usize,
    /// Log every executed instruction at trace level
    pub trace_execution: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            trace_execution: false,
        }
    }
}

/// What a builtin asks the VM to do after it returns.
#[derive(Debug)]
pub enum NativeResult {
    /// Push a value and continue.
    Return(Value),
    /// Push nil, then suspend the task but keep it runnable.
    Yield,
    /// Push nil, then suspend the task. The builtin has already blocked it.
    Block,
    /// Raise an error located at the calling line.
    Raise(String),
    /// Call `callee` in protected mode; the result is nil or the error message.
    TryCall { callee: Value, args: Vec<Value> },
}

/// Signature of a builtin.
pub type NativeFn = fn(&mut NativeCall<'_>, &[Value]) -> Result<NativeResult, ScriptError>;

/// What a builtin can reach while it runs.
pub struct NativeCall<'a> {
    fibers: &'a mut ExecutionSlots<Fiber>,
    pub host: &'a mut dyn TaskHost,
    pub output: &'a mut dyn Write,
}

impl NativeCall<'_> {
    /// Create an execution for `body` and register it as a task.
    pub fn spawn(
        &mut self,
        name: &str,
        body: Value,
    ) -> Result<TaskRef, ScriptError> {
        let fiber = Fiber::new(body).map_err(|e| ScriptError::new(e.to_string()))?;
        let handle = self
            .fibers
            .insert(fiber)
            .map_err(|e| ScriptError::new(e.to_string()))?;
        Ok(self.host.spawn(name, handle))
    }
}

/// One activation record.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: Rc<Function>,
    /// Next instruction
    pub ip: usize,
    /// Stack index of the first argument; the callee sits just below
    pub base: usize,
    /// Errors unwind to this frame instead of failing the fiber
    pub protected: bool,
}

/// A resumable execution context.
#[derive(Debug, Clone)]
pub struct Fiber {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
}

impl Fiber {
    /// Prepare a fiber that calls `body` with no arguments.
    pub fn new(body: Value) -> Result<Self, EngineError> {
        let function = match body {
            Value::Function(function) => function,
            Value::Native(native) => Rc::new(Function::trampoline(native)),
            other => return Err(EngineError::NotCallable(other.type_name().to_string())),
        };
        let mut stack = vec![Value::Function(Rc::clone(&function))];
        stack.resize(1 + function.local_count as usize, Value::Nil);
        Ok(Self {
            stack,
            frames: vec![CallFrame {
                function,
                ip: 0,
                base: 1,
                protected: false,
            }],
        })
    }

    /// Current call depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    fn push(
        &mut self,
        value: Value,
    ) {
        self.stack.push(value);
    }

    #[inline]
    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    #[inline]
    fn peek(&self) -> &Value {
        self.stack.last().unwrap_or(&Value::Nil)
    }

    fn jump(
        &mut self,
        target: usize,
    ) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target;
        }
    }

    /// Source location of the instruction being executed.
    fn location(&self) -> String {
        match self.frames.last() {
            Some(frame) => format!(
                "{}:{}",
                frame.function.source,
                frame.function.chunk.line(frame.ip.saturating_sub(1))
            ),
            None => "?".to_string(),
        }
    }

    /// One line per frame, innermost first.
    fn traceback(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let function = &frame.function;
                match function.kind {
                    FunctionKind::Trampoline(_) => format!("{}: in {}", function.source, function),
                    _ => format!(
                        "{}:{}: in {}",
                        function.source,
                        function.chunk.line(frame.ip.saturating_sub(1)),
                        function
                    ),
                }
            })
            .collect()
    }
}

/// How a run of the dispatch loop ended.
enum Exit {
    Completed(Value),
    Suspended(SuspendReason),
}

/// Dispatch loop state borrowed from the interpreter for one run.
struct Machine<'a> {
    globals: &'a mut IndexMap<String, Value>,
    fibers: &'a mut ExecutionSlots<Fiber>,
    output: &'a mut dyn Write,
    host: &'a mut dyn TaskHost,
    config: &'a InterpreterConfig,
}

impl Machine<'_> {
    fn run(
        &mut self,
        fiber: &mut Fiber,
    ) -> Result<Exit, ScriptError> {
        loop {
            match self.step(fiber) {
                Ok(None) => {}
                Ok(Some(exit)) => return Ok(exit),
                Err(err) => Self::recover(fiber, err)?,
            }
        }
    }

    /// Unwind to the innermost protected frame, leaving the error message
    /// as the protected call's result.
    fn recover(
        fiber: &mut Fiber,
        err: ScriptError,
    ) -> Result<(), ScriptError> {
        match fiber.frames.iter().rposition(|frame| frame.protected) {
            Some(depth) => {
                let base = fiber.frames[depth].base;
                fiber.frames.truncate(depth);
                fiber.stack.truncate(base - 1);
                fiber.push(Value::string(&err.message));
                Ok(())
            }
            None => {
                let mut err = err;
                err.traceback.extend(fiber.traceback());
                Err(err)
            }
        }
    }

    fn error(
        fiber: &Fiber,
        message: impl fmt::Display,
    ) -> ScriptError {
        ScriptError::new(format!("{}: {}", fiber.location(), message))
    }

    fn step(
        &mut self,
        fiber: &mut Fiber,
    ) -> Result<Option<Exit>, ScriptError> {
        let (function, ip, base) = match fiber.frames.last_mut() {
            Some(frame) => {
                let ip = frame.ip;
                frame.ip += 1;
                (Rc::clone(&frame.function), ip, frame.base)
            }
            None => return Ok(Some(Exit::Completed(Value::Nil))),
        };
        let Some(&op) = function.chunk.code.get(ip) else {
            return Err(ScriptError::new(format!(
                "{}: instruction pointer out of range",
                function.source
            )));
        };
        if self.config.trace_execution {
            trace!(target: "lege::vm", "{:>4} {:?} depth={}", ip, op, fiber.frames.len());
        }

        match op {
            Op::Constant(index) => fiber.push(function.chunk.constants[index as usize].clone()),
            Op::Nil => fiber.push(Value::Nil),
            Op::True => fiber.push(Value::Bool(true)),
            Op::False => fiber.push(Value::Bool(false)),
            Op::Pop => {
                fiber.pop();
            }
            Op::GetLocal(slot) => {
                let value = fiber.stack[base + slot as usize].clone();
                fiber.push(value);
            }
            Op::SetLocal(slot) => {
                let value = fiber.pop();
                fiber.stack[base + slot as usize] = value;
            }
            Op::GetGlobal(index) => {
                let name = constant_name(&function, index);
                match self.globals.get(name) {
                    Some(value) => {
                        let value = value.clone();
                        fiber.push(value);
                    }
                    None => {
                        return Err(Self::error(fiber, format_args!("undefined variable '{}'", name)))
                    }
                }
            }
            Op::SetGlobal(index) => {
                let value = fiber.pop();
                self.globals
                    .insert(constant_name(&function, index).to_string(), value);
            }
            Op::GetField(index) => {
                let object = fiber.pop();
                let value = Self::get_field(fiber, &object, constant_name(&function, index))?;
                fiber.push(value);
            }
            Op::SetField(index) => {
                let _value = fiber.pop();
                let object = fiber.pop();
                let name = constant_name(&function, index);
                return Err(match &object {
                    Value::Task(task) => Self::error(fiber, task.set_field(name)),
                    other => Self::error(
                        fiber,
                        format_args!("attempt to index a {} value (field '{}')", other.type_name(), name),
                    ),
                });
            }
            Op::Index => {
                let index = fiber.pop();
                let object = fiber.pop();
                let value = Self::index(fiber, &object, &index)?;
                fiber.push(value);
            }
            Op::Neg => match fiber.pop() {
                Value::Number(n) => fiber.push(Value::Number(-n)),
                other => return Err(Self::arithmetic_error(fiber, &other)),
            },
            Op::Not => {
                let value = fiber.pop();
                fiber.push(Value::Bool(!value.is_truthy()));
            }
            Op::Add => {
                let rhs = fiber.pop();
                let lhs = fiber.pop();
                let value = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                    (Value::Str(_), _) | (_, Value::Str(_)) => {
                        Value::string(format!("{}{}", lhs, rhs))
                    }
                    (Value::Number(_), other) | (other, _) => {
                        return Err(Self::arithmetic_error(fiber, other))
                    }
                };
                fiber.push(value);
            }
            Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                let rhs = fiber.pop();
                let lhs = fiber.pop();
                let (a, b) = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => (*a, *b),
                    (Value::Number(_), other) | (other, _) => {
                        return Err(Self::arithmetic_error(fiber, other))
                    }
                };
                let value = match op {
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => a / b,
                    _ => a - (a / b).floor() * b,
                };
                fiber.push(Value::Number(value));
            }
            Op::Eq | Op::Ne => {
                let rhs = fiber.pop();
                let lhs = fiber.pop();
                let equal = lhs == rhs;
                fiber.push(Value::Bool(if op == Op::Eq { equal } else { !equal }));
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let rhs = fiber.pop();
                let lhs = fiber.pop();
                let ordering = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(Self::error(
                            fiber,
                            format_args!(
                                "attempt to compare {} with {}",
                                lhs.type_name(),
                                rhs.type_name()
                            ),
                        ))
                    }
                };
                let result = match (op, ordering) {
                    (_, None) => false,
                    (Op::Lt, Some(o)) => o == Ordering::Less,
                    (Op::Le, Some(o)) => o != Ordering::Greater,
                    (Op::Gt, Some(o)) => o == Ordering::Greater,
                    (_, Some(o)) => o != Ordering::Less,
                };
                fiber.push(Value::Bool(result));
            }
            Op::Jump(target) => fiber.jump(target),
            Op::JumpIfFalse(target) => {
                if !fiber.peek().is_truthy() {
                    fiber.jump(target);
                }
            }
            Op::JumpIfTrue(target) => {
                if fiber.peek().is_truthy() {
                    fiber.jump(target);
                }
            }
            Op::Call(argc) => return self.call_value(fiber, argc as usize, false),
            Op::Return => {
                let result = fiber.pop();
                let Some(frame) = fiber.frames.pop() else {
                    return Ok(Some(Exit::Completed(result)));
                };
                fiber.stack.truncate(frame.base - 1);
                if fiber.frames.is_empty() {
                    return Ok(Some(Exit::Completed(result)));
                }
                fiber.push(if frame.protected { Value::Nil } else { result });
            }
        }
        Ok(None)
    }

    /// Call the value sitting below the top `argc` stack slots.
    fn call_value(
        &mut self,
        fiber: &mut Fiber,
        argc: usize,
        protected: bool,
    ) -> Result<Option<Exit>, ScriptError> {
        let callee_index = fiber.stack.len() - 1 - argc;
        match fiber.stack[callee_index].clone() {
            Value::Function(function) => {
                if fiber.frames.len() >= self.config.max_call_depth {
                    return Err(Self::error(fiber, "stack overflow"));
                }
                let base = callee_index + 1;
                let arity = function.arity as usize;
                if argc > arity {
                    fiber.stack.truncate(base + arity);
                }
                let frame_size = (function.local_count as usize).max(arity);
                fiber.stack.resize(base + frame_size, Value::Nil);
                fiber.frames.push(CallFrame {
                    function,
                    ip: 0,
                    base,
                    protected,
                });
                Ok(None)
            }
            Value::Native(native) => {
                let args = fiber.stack.split_off(callee_index + 1);
                fiber.stack.pop();
                self.call_native(fiber, native, &args, protected)
            }
            other => Err(Self::error(
                fiber,
                format_args!("attempt to call a {} value", other.type_name()),
            )),
        }
    }

    fn call_native(
        &mut self,
        fiber: &mut Fiber,
        native: NativeFunction,
        args: &[Value],
        protected: bool,
    ) -> Result<Option<Exit>, ScriptError> {
        let result = {
            let mut call = NativeCall {
                fibers: &mut *self.fibers,
                host: &mut *self.host,
                output: &mut *self.output,
            };
            (native.func)(&mut call, args)
        };

        match result {
            Ok(NativeResult::Return(value)) => {
                fiber.push(if protected { Value::Nil } else { value });
                Ok(None)
            }
            Ok(NativeResult::Yield) => {
                fiber.push(Value::Nil);
                Ok(Some(Exit::Suspended(SuspendReason::Yield)))
            }
            Ok(NativeResult::Block) => {
                fiber.push(Value::Nil);
                Ok(Some(Exit::Suspended(SuspendReason::Block)))
            }
            Ok(NativeResult::TryCall { callee, args }) => {
                let argc = args.len();
                fiber.push(callee);
                fiber.stack.extend(args);
                self.call_value(fiber, argc, true)
            }
            Ok(NativeResult::Raise(message)) => {
                let err = Self::error(fiber, message);
                if protected {
                    fiber.push(Value::string(&err.message));
                    Ok(None)
                } else {
                    Err(err)
                }
            }
            Err(err) if protected => {
                fiber.push(Value::string(&err.message));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn get_field(
        fiber: &Fiber,
        object: &Value,
        name: &str,
    ) -> Result<Value, ScriptError> {
        match object {
            Value::Task(task) => {
                let field = task.field(name).map_err(|e| Self::error(fiber, e))?;
                Ok(Value::task_field(task, field))
            }
            other => Err(Self::error(
                fiber,
                format_args!("attempt to index a {} value (field '{}')", other.type_name(), name),
            )),
        }
    }

    fn index(
        fiber: &Fiber,
        object: &Value,
        index: &Value,
    ) -> Result<Value, ScriptError> {
        match (object, index) {
            (Value::List(items), Value::Number(n)) => {
                if *n >= 0.0 && n.fract() == 0.0 {
                    Ok(items.get(*n as usize).cloned().unwrap_or(Value::Nil))
                } else {
                    Ok(Value::Nil)
                }
            }
            (Value::List(_), other) => Err(Self::error(
                fiber,
                format_args!("attempt to index a list with a {} value", other.type_name()),
            )),
            (other, _) => Err(Self::error(
                fiber,
                format_args!("attempt to index a {} value", other.type_name()),
            )),
        }
    }

    fn arithmetic_error(
        fiber: &Fiber,
        operand: &Value,
    ) -> ScriptError {
        Self::error(
            fiber,
            format_args!("attempt to perform arithmetic on a {} value", operand.type_name()),
        )
    }
}

fn constant_name(
    function: &Function,
    index: u16,
) -> &str {
    function.chunk.constants[index as usize]
        .as_str()
        .unwrap_or_default()
}

/// The LegeScript engine.
pub struct Interpreter {
    config: InterpreterConfig,
    globals: IndexMap<String, Value>,
    fibers: ExecutionSlots<Fiber>,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// Create an interpreter that prints to stdout.
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    /// Create an interpreter with custom configuration.
    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut globals = IndexMap::new();
        builtins::install(&mut globals);
        Self {
            config,
            globals,
            fibers: ExecutionSlots::new(),
            output: Box::new(io::stdout()),
        }
    }

    /// Redirect `print` output.
    pub fn with_output(
        mut self,
        output: impl Write + 'static,
    ) -> Self {
        self.set_output(output);
        self
    }

    pub fn set_output(
        &mut self,
        output: impl Write + 'static,
    ) {
        self.output = Box::new(output);
    }

    /// Compile `source` into a callable main chunk.
    pub fn load(
        &self,
        source: &str,
        chunk_name: &str,
    ) -> Result<Value, CompileError> {
        super::compile(source, chunk_name).map(Value::Function)
    }

    /// Get a global variable.
    pub fn global(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Set a global variable.
    pub fn set_global(
        &mut self,
        name: &str,
        value: Value,
    ) {
        self.globals.insert(name.to_string(), value);
    }

    /// Expose a host function to scripts.
    pub fn register(
        &mut self,
        name: &'static str,
        func: NativeFn,
    ) {
        self.set_global(name, Value::Native(NativeFunction::new(name, func)));
    }

    /// Number of execution contexts not yet finished.
    pub fn live_fibers(&self) -> usize {
        self.fibers.len()
    }

    #[inline]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("globals", &self.globals.len())
            .field("fibers", &self.fibers.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ScriptEngine for Interpreter {
    type Body = Value;
    type Value = Value;

    fn create_execution(
        &mut self,
        body: Value,
    ) -> Result<ExecutionHandle, EngineError> {
        self.fibers.insert(Fiber::new(body)?)
    }

    fn resume(
        &mut self,
        handle: ExecutionHandle,
        host: &mut dyn TaskHost,
    ) -> Result<ResumeOutcome<Value>, EngineError> {
        let mut fiber = self.fibers.checkout(handle)?;
        let result = Machine {
            globals: &mut self.globals,
            fibers: &mut self.fibers,
            output: self.output.as_mut(),
            host,
            config: &self.config,
        }
        .run(&mut fiber);

        Ok(match result {
            Ok(Exit::Suspended(reason)) => {
                self.fibers.checkin(handle, fiber)?;
                ResumeOutcome::Suspended(reason)
            }
            Ok(Exit::Completed(value)) => {
                self.fibers.release(handle);
                ResumeOutcome::Completed(vec![value])
            }
            Err(err) => {
                self.fibers.release(handle);
                ResumeOutcome::Failed(err)
            }
        })
    }

    fn call_main(
        &mut self,
        body: Value,
        host: &mut dyn TaskHost,
    ) -> Result<(), ScriptError> {
        let mut fiber = Fiber::new(body).map_err(|e| ScriptError::new(e.to_string()))?;
        let exit = Machine {
            globals: &mut self.globals,
            fibers: &mut self.fibers,
            output: self.output.as_mut(),
            host,
            config: &self.config,
        }
        .run(&mut fiber)?;

        match exit {
            Exit::Completed(_) => Ok(()),
            Exit::Suspended(SuspendReason::Yield) => Err(UsageError::YieldOutsideTask.into()),
            Exit::Suspended(SuspendReason::Block) => Err(UsageError::BlockOutsideTask.into()),
        }
    }

    fn is_alive(
        &self,
        handle: ExecutionHandle,
    ) -> bool {
        self.fibers.contains(handle)
    }
}
