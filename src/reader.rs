//! Character source for the parser.
//!
//! The reader pulls its input in fixed-width chunks, one physical line at a
//! time. A line longer than a chunk is split into several *segments*; the
//! column reported for diagnostics folds the segment back in so positions stay
//! absolute within the physical line.

use std::io::{self, BufRead};

/// Width of the chunk buffer, including the slot reserved for the terminator.
pub const LINE_BUFFER_WIDTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub segment: usize,
    /// One-based column of the last consumed byte inside the current chunk.
    pub column: usize,
}

pub struct PositionedReader<R> {
    input: R,
    width: usize,
    chunk: Vec<u8>,
    position: usize,
    line: usize,
    segment: usize,
    end_of_line: bool,
}

impl<R: BufRead> PositionedReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_width(input, LINE_BUFFER_WIDTH)
    }

    /// Widths below 2 cannot hold a single byte and are raised to 2.
    pub fn with_width(input: R, width: usize) -> Self {
        Self {
            input,
            width: width.max(2),
            chunk: Vec::new(),
            position: 0,
            line: 0,
            segment: 0,
            end_of_line: true,
        }
    }

    /// Returns the next byte, or `None` once the input is exhausted.
    ///
    /// Reading past the end is repeatable: every further call yields `None`.
    pub fn next_char(&mut self) -> io::Result<Option<u8>> {
        loop {
            if let Some(&byte) = self.chunk.get(self.position) {
                self.position += 1;
                return Ok(Some(byte));
            }
            // Step over the virtual terminator so a push back lands on it.
            self.position = self.chunk.len() + 1;
            if !self.refill()? {
                return Ok(None);
            }
        }
    }

    /// Un-reads the byte returned by the last `next_char` call.
    pub fn push_back(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            segment: self.segment,
            column: self.position,
        }
    }

    /// Column within the physical line, independent of chunk boundaries.
    pub fn absolute_column(&self) -> usize {
        self.segment * (self.width - 1) + self.position
    }

    /// Text of the chunk currently being read, as shown under a diagnostic.
    pub fn current_text(&self) -> String {
        String::from_utf8_lossy(&self.chunk).into_owned()
    }

    fn refill(&mut self) -> io::Result<bool> {
        let capacity = self.width - 1;
        let mut chunk = Vec::with_capacity(capacity);
        while chunk.len() < capacity {
            let available = self.input.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let room = capacity - chunk.len();
            let take = match available.iter().take(room).position(|&b| b == b'\n') {
                Some(newline) => newline + 1,
                None => available.len().min(room),
            };
            chunk.extend_from_slice(&available[..take]);
            self.input.consume(take);
            if chunk.last() == Some(&b'\n') {
                break;
            }
        }

        if chunk.is_empty() {
            return Ok(false);
        }

        if self.end_of_line {
            self.line += 1;
            self.segment = 0;
            self.end_of_line = false;
        } else {
            self.segment += 1;
        }
        self.position = 0;
        self.end_of_line = chunk.last() == Some(&b'\n');
        self.chunk = chunk;
        Ok(true)
    }
}
