//! Builtin functions available to every script.

use indexmap::IndexMap;
use std::time::Duration;
use tracing::info;

use super::value::{NativeFunction, Value};
use super::vm::{NativeCall, NativeFn, NativeResult};
use crate::runtime::engine::{ScriptError, UsageError};

/// Name and implementation of every builtin.
pub const BUILTINS: &[(&str, NativeFn)] = &[
    ("spawn", spawn),
    ("block", block),
    ("yield", yield_now),
    ("sleep", sleep),
    ("current", current),
    ("print", print),
    ("log", log),
    ("len", len),
    ("tostring", tostring),
    ("type", type_of),
    ("try", try_call),
    ("error", error),
];

/// Define every builtin as a global.
pub fn install(globals: &mut IndexMap<String, Value>) {
    for &(name, func) in BUILTINS {
        globals.insert(name.to_string(), Value::Native(NativeFunction::new(name, func)));
    }
}

fn type_at(
    args: &[Value],
    position: usize,
) -> String {
    args.get(position - 1)
        .map(|v| v.type_name())
        .unwrap_or("no value")
        .to_string()
}

fn bad_argument(
    args: &[Value],
    position: usize,
    function: &'static str,
    expected: &'static str,
) -> ScriptError {
    UsageError::BadArgument {
        position,
        function,
        expected,
        got: type_at(args, position),
    }
    .into()
}

/// Arguments rendered and joined the way `print` and `log` show them.
fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}

fn spawn(
    call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let name = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| bad_argument(args, 1, "spawn", "string"))?;
    let body = args
        .get(1)
        .filter(|v| v.is_callable())
        .ok_or_else(|| bad_argument(args, 2, "spawn", "function"))?;
    let task = call.spawn(name, body.clone())?;
    Ok(NativeResult::Return(Value::Task(task)))
}

fn block(
    call: &mut NativeCall<'_>,
    _args: &[Value],
) -> Result<NativeResult, ScriptError> {
    call.host.block()?;
    Ok(NativeResult::Block)
}

fn yield_now(
    call: &mut NativeCall<'_>,
    _args: &[Value],
) -> Result<NativeResult, ScriptError> {
    if call.host.current_task().is_none() {
        return Err(UsageError::YieldOutsideTask.into());
    }
    Ok(NativeResult::Yield)
}

fn sleep(
    call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let seconds = args
        .first()
        .and_then(Value::as_number)
        .ok_or_else(|| bad_argument(args, 1, "sleep", "number"))?;
    // Negative delays mean "next tick"; NaN and out-of-range values are rejected.
    let delay = if seconds.is_nan() {
        None
    } else {
        Duration::try_from_secs_f64(seconds.max(0.0)).ok()
    }
    .ok_or_else(|| UsageError::BadArgument {
        position: 1,
        function: "sleep",
        expected: "finite delay",
        got: Value::Number(seconds).to_string(),
    })?;
    call.host.wake_after(delay)?;
    call.host.block()?;
    Ok(NativeResult::Block)
}

fn current(
    call: &mut NativeCall<'_>,
    _args: &[Value],
) -> Result<NativeResult, ScriptError> {
    Ok(NativeResult::Return(
        call.host.current_task().map(Value::Task).unwrap_or(Value::Nil),
    ))
}

fn print(
    call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    writeln!(call.output, "{}", joined(args))
        .map_err(|e| ScriptError::new(format!("print failed: {}", e)))?;
    Ok(NativeResult::Return(Value::Nil))
}

fn log(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    info!(target: "lege::script", "{}", joined(args));
    Ok(NativeResult::Return(Value::Nil))
}

fn len(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let n = match args.first() {
        Some(Value::Str(s)) => s.chars().count(),
        Some(Value::List(items)) => items.len(),
        _ => return Err(bad_argument(args, 1, "len", "string or list")),
    };
    Ok(NativeResult::Return(Value::Number(n as f64)))
}

fn tostring(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let value = args
        .first()
        .ok_or_else(|| bad_argument(args, 1, "tostring", "value"))?;
    Ok(NativeResult::Return(Value::string(value.to_string())))
}

fn type_of(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let value = args
        .first()
        .ok_or_else(|| bad_argument(args, 1, "type", "value"))?;
    Ok(NativeResult::Return(Value::string(value.type_name())))
}

fn try_call(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let callee = args
        .first()
        .filter(|v| v.is_callable())
        .ok_or_else(|| bad_argument(args, 1, "try", "function"))?;
    Ok(NativeResult::TryCall {
        callee: callee.clone(),
        args: args[1..].to_vec(),
    })
}

fn error(
    _call: &mut NativeCall<'_>,
    args: &[Value],
) -> Result<NativeResult, ScriptError> {
    let message = args
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "error".to_string());
    Ok(NativeResult::Raise(message))
}
