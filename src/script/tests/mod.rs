//! LegeScript unit tests

mod lexer;

use crate::runtime::reactor::EventLoop;
use crate::runtime::scheduler::{Scheduler, SchedulerError};
use crate::script::{Interpreter, OutputBuffer, Value};

pub(super) type ScriptScheduler = Scheduler<Interpreter, EventLoop>;

/// Load `source`, run the main chunk, then tick until no task is alive.
pub(super) fn run(source: &str) -> (OutputBuffer, Result<ScriptScheduler, SchedulerError>) {
    let out = OutputBuffer::new();
    let interpreter = Interpreter::new().with_output(out.clone());
    let main = interpreter.load(source, "main").unwrap();
    let mut scheduler = Scheduler::new(interpreter, EventLoop::new());

    let result = drive(&mut scheduler, main);
    (out, result.map(|()| scheduler))
}

fn drive(
    scheduler: &mut ScriptScheduler,
    main: Value,
) -> Result<(), SchedulerError> {
    scheduler.call_main(main)?;
    for _ in 0..1000 {
        if !scheduler.tick()? {
            break;
        }
    }
    Ok(())
}

/// Run `source` and return its output, panicking on any error.
pub(super) fn output_of(source: &str) -> String {
    let (out, result) = run(source);
    if let Err(err) = result {
        panic!("script failed: {}\noutput so far:\n{}", err, out.contents());
    }
    out.contents()
}

/// Run `source` and return the error it fails with.
pub(super) fn error_of(source: &str) -> SchedulerError {
    match run(source).1 {
        Ok(_) => panic!("script succeeded unexpectedly"),
        Err(err) => err,
    }
}
