//! Depth-bounded include stack
//!
//! Each frame owns its reader, its line buffer, and its physical line
//! counter, so popping back to the including file resumes exactly where the
//! directive left off. A frame opened from an include directory also carries
//! the not-yet-opened sibling files; they are stored sorted in descending
//! order and popped from the tail, which yields ascending processing order
//! without shifting the vector.

use super::source::SourceOpener;
use crate::config::compile_time::inclusion::MAX_INCLUDE_DEPTH;
use crate::lexical::line_buffer::LineBuffer;
use crate::log_debug;
use crate::tokens::FatalError;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

pub struct IncludeFrame {
    pub path: Arc<str>,
    pub reader: Option<Box<dyn BufRead>>,
    pub line: LineBuffer,
    pub line_number: u32,
    /// Remaining directory siblings, descending, consumed from the tail
    pub pending: Vec<Arc<str>>,
    /// Retain the reader instead of dropping it when this frame is popped
    pub keep_open: bool,
}

impl IncludeFrame {
    fn new(path: Arc<str>, reader: Box<dyn BufRead>, keep_open: bool) -> Self {
        Self {
            path,
            reader: Some(reader),
            line: LineBuffer::new(),
            line_number: 0,
            pending: Vec::new(),
            keep_open,
        }
    }
}

/// What happened when the current source ran out of input
#[derive(Debug, PartialEq, Eq)]
pub enum PopOutcome {
    /// The frame moved on to the next pending directory sibling
    AdvancedToPending,
    /// The frame was removed and its includer is current again
    PoppedToParent,
    /// The stack is empty
    Finished,
}

pub struct IncludeStack {
    frames: Vec<IncludeFrame>,
    retained: Option<Box<dyn BufRead>>,
}

impl IncludeStack {
    pub fn new(path: Arc<str>, reader: Box<dyn BufRead>, keep_open: bool) -> Self {
        Self {
            frames: vec![IncludeFrame::new(path, reader, keep_open)],
            retained: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current(&mut self) -> Option<&mut IncludeFrame> {
        self.frames.last_mut()
    }

    pub fn current_path(&self) -> Option<&Arc<str>> {
        self.frames.last().map(|f| &f.path)
    }

    /// Push a new source. Fails when the nesting depth is exhausted.
    pub fn push(
        &mut self,
        path: Arc<str>,
        reader: Box<dyn BufRead>,
        pending: Vec<Arc<str>>,
    ) -> Result<(), FatalError> {
        if self.frames.len() > MAX_INCLUDE_DEPTH {
            return Err(FatalError::TooManyIncludes);
        }

        let mut frame = IncludeFrame::new(path, reader, false);
        frame.pending = pending;
        self.frames.push(frame);
        Ok(())
    }

    /// Retire the current source. Directory siblings are tried first; a
    /// sibling that fails to open is skipped.
    pub fn pop<O: SourceOpener>(&mut self, opener: &O) -> PopOutcome {
        let Some(frame) = self.frames.last_mut() else {
            return PopOutcome::Finished;
        };

        while let Some(next) = frame.pending.pop() {
            match opener.open(Path::new(next.as_ref())) {
                Ok(reader) => {
                    frame.path = next;
                    frame.reader = Some(reader);
                    frame.line = LineBuffer::new();
                    frame.line_number = 0;
                    return PopOutcome::AdvancedToPending;
                }
                Err(e) => {
                    log_debug!("skipping unopenable include directory entry",
                        "path" => next,
                        "error" => e
                    );
                }
            }
        }

        if let Some(done) = self.frames.pop() {
            if done.keep_open {
                self.retained = done.reader;
            }
        }

        if self.frames.is_empty() {
            PopOutcome::Finished
        } else {
            PopOutcome::PoppedToParent
        }
    }

    /// Take back the root reader after a keep-open run
    pub fn take_retained(&mut self) -> Option<Box<dyn BufRead>> {
        self.retained.take()
    }
}
