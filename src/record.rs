//! Fixed-width output records and the accumulator that builds them.

use std::mem;

/// Standard record width (punch card).
pub const RECORD_WIDTH: usize = 80;

/// One complete output record of exactly the configured width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(Vec<u8>);

impl Record {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// The record as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// Collects bytes until exactly `width` of them form a record.
///
/// Bytes short of a full record at the end of the stream are never emitted;
/// [`RecordAccumulator::discard`] drops them.
#[derive(Debug)]
pub struct RecordAccumulator {
    buf: Vec<u8>,
    width: usize,
}

impl RecordAccumulator {
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "record width must be at least 1");
        Self {
            buf: Vec::with_capacity(width),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Bytes waiting for the current record to fill.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append one byte, returning the record it completes, if any.
    pub fn push(&mut self, byte: u8) -> Option<Record> {
        self.buf.push(byte);
        if self.buf.len() == self.width {
            let full = mem::replace(&mut self.buf, Vec::with_capacity(self.width));
            Some(Record(full))
        } else {
            None
        }
    }

    /// Drop the partial record, returning how many bytes were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }
}
