//! Input lines and the bounded line reader.

use std::io::{BufRead, Read};

use log::warn;

use crate::config::LongLinePolicy;
use crate::error::{PipelineError, Result};

/// Longest accepted input line, terminator included.
pub const MAX_LINE: usize = 1000;

/// Input line terminator and output record separator.
pub const LINE_SEPARATOR: u8 = b'\n';

/// One unit of work handed between stages.
///
/// Holds the raw bytes of an input line, including its terminator when the
/// source had one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line(Vec<u8>);

impl Line {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Reads lines of at most `max_line` bytes from a buffered source.
///
/// Never buffers more than `max_line` bytes of a single line; the excess of an
/// overlong line is skipped in place.
pub struct LineReader<R> {
    inner: R,
    max_line: usize,
    policy: LongLinePolicy,
    truncated: u64,
    last_truncated: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, max_line: usize, policy: LongLinePolicy) -> Self {
        Self {
            inner,
            max_line,
            policy,
            truncated: 0,
            last_truncated: false,
        }
    }

    /// Number of lines shortened so far.
    pub fn truncated(&self) -> u64 {
        self.truncated
    }

    /// Whether the line last returned was shortened to fit.
    ///
    /// A shortened line is never the sentinel, whatever its bytes.
    pub fn last_was_truncated(&self) -> bool {
        self.last_truncated
    }

    /// Read the next line, terminator included.
    ///
    /// Returns `Ok(None)` at end of stream. The final line may lack a
    /// terminator.
    pub fn read_line(&mut self) -> Result<Option<Line>> {
        self.last_truncated = false;
        let mut buf = Vec::with_capacity(128);
        let read = self
            .inner
            .by_ref()
            .take(self.max_line as u64)
            .read_until(LINE_SEPARATOR, &mut buf)
            .map_err(|source| PipelineError::SourceRead { source })?;
        if read == 0 {
            return Ok(None);
        }

        if buf.len() == self.max_line && buf.last() != Some(&LINE_SEPARATOR) {
            let skipped = self
                .inner
                .skip_until(LINE_SEPARATOR)
                .map_err(|source| PipelineError::SourceRead { source })?;
            if skipped > 0 {
                let len = self.max_line + skipped;
                match self.policy {
                    LongLinePolicy::Reject => {
                        return Err(PipelineError::LineTooLong {
                            len,
                            max: self.max_line,
                        });
                    }
                    LongLinePolicy::Truncate => {
                        warn!(
                            "input line of {len} bytes truncated to {} bytes",
                            self.max_line
                        );
                        buf.truncate(self.max_line - 1);
                        buf.push(LINE_SEPARATOR);
                        self.truncated += 1;
                        self.last_truncated = true;
                    }
                }
            }
        }

        Ok(Some(Line(buf)))
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}
