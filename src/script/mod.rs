//! LegeScript
//!
//! A small dynamically typed language whose functions run as cooperative
//! tasks. Source goes through [`lexer`], [`parser`] and [`compiler`] into
//! bytecode that the [`vm::Interpreter`] executes on resumable fibers.
//!
//! ```rust
//! use lege::runtime::reactor::EventLoop;
//! use lege::runtime::scheduler::Scheduler;
//! use lege::script::{Interpreter, OutputBuffer};
//!
//! let out = OutputBuffer::new();
//! let interpreter = Interpreter::new().with_output(out.clone());
//! let main = interpreter
//!     .load(r#"spawn("greeter", fn() { print("hello from", current().name) })"#, "main")
//!     .unwrap();
//!
//! let mut scheduler = Scheduler::new(interpreter, EventLoop::new());
//! scheduler.call_main(main).unwrap();
//! while scheduler.tick().unwrap() {}
//! assert_eq!(out.contents(), "hello from\tgreeter\n");
//! ```

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod value;
pub mod vm;

pub use compiler::{Chunk, Function, Op};
pub use errors::{CompileError, LexError, ParseError};
pub use output::OutputBuffer;
pub use value::{NativeFunction, Value};
pub use vm::{Fiber, Interpreter, InterpreterConfig, NativeCall, NativeFn, NativeResult};

use std::rc::Rc;
use tracing::debug;

/// Compile `source` into the main function of a chunk named `chunk_name`.
pub fn compile(
    source: &str,
    chunk_name: &str,
) -> Result<Rc<Function>, CompileError> {
    let tokens = lexer::tokenize(source).map_err(|error| CompileError::Lex {
        chunk: chunk_name.to_string(),
        error,
    })?;
    let program = parser::parse(&tokens).map_err(|error| CompileError::Parse {
        chunk: chunk_name.to_string(),
        error,
    })?;
    let function = compiler::compile_program(&program, chunk_name)?;
    debug!(
        chunk = chunk_name,
        statements = program.statements.len(),
        instructions = function.chunk.code.len(),
        "compiled chunk"
    );
    Ok(function)
}

#[cfg(test)]
mod tests;
