//! The stack of output buffers that evaluated views and open sections write into

use std::cell::RefCell;

/// A stack of growable text buffers; writes always go to the top one
#[derive(Debug, Default)]
pub struct OutputStack {
    buffers: Vec<String>,
}

impl OutputStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing into a fresh buffer
    pub fn push(&mut self) {
        self.buffers.push(String::new());
    }

    /// Stop capturing and return what the top buffer collected
    ///
    /// Popping an empty stack yields an empty string.
    pub fn pop(&mut self) -> String {
        self.buffers.pop().unwrap_or_default()
    }

    pub fn write(&mut self, text: &str) {
        match self.buffers.last_mut() {
            Some(top) => top.push_str(text),
            None => self.buffers.push(text.to_string()),
        }
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    /// Discard every buffer above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.buffers.truncate(depth);
    }
}

/// Captures everything written while a view evaluates
///
/// Entering pushes a buffer. [`BufferScope::finish`] pops it and returns its
/// contents; dropping the scope without finishing (an error path) discards it
/// together with any buffers opened above it, restoring the entry depth.
pub struct BufferScope<'a> {
    output: &'a RefCell<OutputStack>,
    depth: usize,
    finished: bool,
}

impl<'a> BufferScope<'a> {
    pub fn enter(output: &'a RefCell<OutputStack>) -> Self {
        let mut stack = output.borrow_mut();
        let depth = stack.depth();
        stack.push();
        drop(stack);
        Self {
            output,
            depth,
            finished: false,
        }
    }

    /// Pop the scope's buffer, discarding any left open above it
    pub fn finish(mut self) -> String {
        self.finished = true;
        let mut stack = self.output.borrow_mut();
        stack.truncate(self.depth + 1);
        stack.pop()
    }
}

impl Drop for BufferScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.output.borrow_mut().truncate(self.depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_go_to_top_buffer() {
        let mut output = OutputStack::new();
        output.push();
        output.write("outer ");
        output.push();
        output.write("inner");
        assert_eq!(output.pop(), "inner");
        output.write("again");
        assert_eq!(output.pop(), "outer again");
        assert_eq!(output.depth(), 0);
    }

    #[test]
    fn test_scope_finish_returns_captured_text() {
        let output = RefCell::new(OutputStack::new());
        let scope = BufferScope::enter(&output);
        output.borrow_mut().write("hello");
        assert_eq!(scope.finish(), "hello");
        assert_eq!(output.borrow().depth(), 0);
    }

    #[test]
    fn test_finish_ignores_unclosed_inner_buffers() {
        let output = RefCell::new(OutputStack::new());
        let scope = BufferScope::enter(&output);
        output.borrow_mut().write("view");
        output.borrow_mut().push();
        output.borrow_mut().write("left open");
        assert_eq!(scope.finish(), "view");
        assert_eq!(output.borrow().depth(), 0);
    }

    #[test]
    fn test_dropped_scope_discards_nested_buffers() {
        let output = RefCell::new(OutputStack::new());
        output.borrow_mut().push();
        {
            let _scope = BufferScope::enter(&output);
            output.borrow_mut().push();
            output.borrow_mut().write("partial");
            assert_eq!(output.borrow().depth(), 3);
        }
        assert_eq!(output.borrow().depth(), 1);
    }
}
