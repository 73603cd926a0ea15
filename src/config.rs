//! Pipeline configuration.
//!
//! Defaults reproduce the classic behavior: 80-byte output records, lines of
//! at most 1000 bytes, `STOP` as the end-of-input line, and `++` folded to `^`.

use crate::error::{PipelineError, Result};
use crate::line::{LINE_SEPARATOR, MAX_LINE};
use crate::record::RECORD_WIDTH;

/// Default number of lines each hand-off queue can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Default end-of-input line, without its terminator.
pub const DEFAULT_SENTINEL: &str = "STOP";

/// Character whose adjacent pairs get folded.
pub const PLUS: u8 = b'+';

/// Replacement for one folded pair.
pub const FOLD: u8 = b'^';

/// What the input stage does with a line longer than the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongLinePolicy {
    /// Keep the first `max_line - 1` bytes plus a terminator and warn.
    #[default]
    Truncate,
    /// Stop the input stage with [`PipelineError::LineTooLong`].
    Reject,
}

/// Tunables shared by all four stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Width of every emitted record, excluding the record separator.
    pub record_width: usize,
    /// Capacity of each of the three hand-off queues.
    pub queue_capacity: usize,
    /// Longest accepted input line, terminator included.
    pub max_line: usize,
    /// End-of-input line, without its terminator.
    pub sentinel: String,
    /// Byte replaced by a space in the separator stage and written after records.
    pub separator: u8,
    pub plus: u8,
    pub fold: u8,
    pub long_lines: LongLinePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            record_width: RECORD_WIDTH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line: MAX_LINE,
            sentinel: DEFAULT_SENTINEL.to_string(),
            separator: LINE_SEPARATOR,
            plus: PLUS,
            fold: FOLD,
            long_lines: LongLinePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_record_width(mut self, width: usize) -> Self {
        self.record_width = width;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_long_lines(mut self, policy: LongLinePolicy) -> Self {
        self.long_lines = policy;
        self
    }

    /// The exact bytes of a sentinel line as read from input.
    pub fn sentinel_line(&self) -> Vec<u8> {
        let mut line = self.sentinel.as_bytes().to_vec();
        line.push(self.separator);
        line
    }

    /// Check that the configuration can drive a pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.record_width == 0 {
            return Err(PipelineError::InvalidConfig(
                "record width must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.sentinel.as_bytes().contains(&self.separator) {
            return Err(PipelineError::InvalidConfig(
                "sentinel must not contain the line separator".to_string(),
            ));
        }
        let sentinel_len = self.sentinel.len() + 1;
        if self.max_line < 2 || self.max_line < sentinel_len {
            return Err(PipelineError::InvalidConfig(format!(
                "maximum line length {} cannot hold the {sentinel_len}-byte sentinel line",
                self.max_line
            )));
        }
        Ok(())
    }
}
