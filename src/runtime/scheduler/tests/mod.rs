//! Scheduler unit tests


use std::cell::Cell;
use std::rc::Rc;

use crate::runtime::engine::native::{self, NativeBody, NativeEngine, Step};
use crate::runtime::reactor::EventLoop;
use crate::runtime::scheduler::Scheduler;

pub(super) type TestScheduler = Scheduler<NativeEngine, EventLoop>;

pub(super) fn scheduler() -> TestScheduler {
    Scheduler::new(NativeEngine::new(), EventLoop::new())
}

/// Body that returns at once, counting its resumes.
pub(super) fn finishes(counter: &Rc<Cell<u32>>) -> NativeBody {
    let counter = Rc::clone(counter);
    native::task(move |_| {
        counter.set(counter.get() + 1);
        Ok(Step::Done)
    })
}

/// Body that blocks on its first resume and finishes on the next one.
/// `reached` is set once the body runs past the block point.
pub(super) fn blocks_once(reached: &Rc<Cell<bool>>) -> NativeBody {
    let reached = Rc::clone(reached);
    let mut blocked = false;
    native::task(move |ctx| {
        if !blocked {
            blocked = true;
            return ctx.block();
        }
        reached.set(true);
        Ok(Step::Done)
    })
}

/// Body that yields `n` times, then finishes.
pub(super) fn yields(n: u32) -> NativeBody {
    let mut left = n;
    native::task(move |_| {
        if left == 0 {
            return Ok(Step::Done);
        }
        left -= 1;
        Ok(Step::Yield)
    })
}
