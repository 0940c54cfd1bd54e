//! Capturable output sink for `print`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Shared in-memory writer. Clones write to the same buffer, so a host can
/// hand one clone to the interpreter and read the other.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Rc<RefCell<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow()).into_owned()
    }

    /// Written lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl Write for OutputBuffer {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.inner.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
