//! Indented text output for configuration files

use std::fmt::{self, Write};
use std::ops::{Deref, DerefMut};

const INDENT: &str = "    ";

/// Append-only configuration text buffer
///
/// Statements are written one per line at the current depth. Blocks are
/// opened with [`section`](Self::section) and closed when the returned
/// guard is dropped.
#[derive(Debug, Default)]
pub struct ConfWriter {
    buf: String,
    depth: usize,
}

impl ConfWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(4 * 1024),
            depth: 0,
        }
    }

    /// Current nesting depth
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Write one indented line
    pub fn line(&mut self, text: impl fmt::Display) {
        self.indent();
        let _ = writeln!(self.buf, "{text}");
    }

    /// Write an empty line
    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write a line commented out with a leading `#`
    pub fn comment_line(&mut self, text: impl fmt::Display) {
        self.buf.push('#');
        self.line(text);
    }

    /// Open a block named `header`
    pub fn section(&mut self, header: impl fmt::Display) -> Section<'_> {
        self.line(header);
        self.line("{");
        self.depth += 1;
        Section { writer: self }
    }

    /// The text written so far
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
    }
}

/// Open block of a [`ConfWriter`]; closes the block on drop
#[derive(Debug)]
pub struct Section<'a> {
    writer: &'a mut ConfWriter,
}

impl Deref for Section<'_> {
    type Target = ConfWriter;

    fn deref(&self) -> &ConfWriter {
        self.writer
    }
}

impl DerefMut for Section<'_> {
    fn deref_mut(&mut self) -> &mut ConfWriter {
        self.writer
    }
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        self.writer.depth = self.writer.depth.saturating_sub(1);
        self.writer.line("}");
    }
}
