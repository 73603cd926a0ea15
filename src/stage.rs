//! Per-line stage logic.
//!
//! The two rewriting stages implement [`LineStage`]: one line in, one line
//! out. The output stage is a sink that re-chunks bytes into fixed-width
//! records. None of these types know about threads or queues; the executor
//! wires them together.

use std::io::Write;

use log::debug;

use crate::error::{PipelineError, Result};
use crate::line::Line;
use crate::record::{Record, RecordAccumulator};

pub const INPUT_STAGE: &str = "input";
pub const SEPARATOR_STAGE: &str = "separator";
pub const PLUS_FOLD_STAGE: &str = "plus-fold";
pub const OUTPUT_STAGE: &str = "output";

/// A stage that rewrites one line at a time.
pub trait LineStage {
    /// Rewrite a single line.
    fn process(&mut self, line: Line) -> Line;

    /// The display name of this stage.
    fn name(&self) -> &'static str;
}

/// Replaces every line separator with a space, keeping the length.
#[derive(Debug)]
pub struct SeparatorStage {
    separator: u8,
}

impl SeparatorStage {
    pub fn new(separator: u8) -> Self {
        Self { separator }
    }
}

impl LineStage for SeparatorStage {
    fn process(&mut self, mut line: Line) -> Line {
        for byte in line.as_bytes_mut() {
            if *byte == self.separator {
                *byte = b' ';
            }
        }
        line
    }

    fn name(&self) -> &'static str {
        SEPARATOR_STAGE
    }
}

/// Collapses each adjacent pair of `plus` bytes into one `fold` byte.
#[derive(Debug)]
pub struct PlusFoldStage {
    plus: u8,
    fold: u8,
    pairs_folded: u64,
}

impl PlusFoldStage {
    pub fn new(plus: u8, fold: u8) -> Self {
        Self {
            plus,
            fold,
            pairs_folded: 0,
        }
    }

    /// Pairs folded across every line processed so far.
    pub fn pairs_folded(&self) -> u64 {
        self.pairs_folded
    }
}

impl LineStage for PlusFoldStage {
    fn process(&mut self, line: Line) -> Line {
        let (folded, pairs) = fold_pairs(line.as_bytes(), self.plus, self.fold);
        self.pairs_folded += pairs as u64;
        Line::new(folded)
    }

    fn name(&self) -> &'static str {
        PLUS_FOLD_STAGE
    }
}

/// Fold pairs of `plus` into `fold` in one left-to-right pass.
///
/// Pairs never overlap and a produced `fold` byte is never rescanned, so a run
/// of N `plus` bytes becomes N/2 `fold` bytes followed by one `plus` when N is
/// odd. Returns the rewritten bytes and the number of pairs folded.
pub fn fold_pairs(input: &[u8], plus: u8, fold: u8) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(input.len());
    let mut pairs = 0;
    let mut i = 0;
    while i < input.len() {
        if input[i] == plus && input.get(i + 1) == Some(&plus) {
            out.push(fold);
            pairs += 1;
            i += 2;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    (out, pairs)
}

/// What the output stage did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSummary {
    pub records_written: u64,
    /// Trailing bytes that never filled a record.
    pub discarded_bytes: usize,
}

/// Writes full records to a sink, each followed by the separator.
pub struct OutputStage<W> {
    writer: W,
    accumulator: RecordAccumulator,
    separator: u8,
    records_written: u64,
}

impl<W: Write> OutputStage<W> {
    pub fn new(writer: W, width: usize, separator: u8) -> Self {
        Self {
            writer,
            accumulator: RecordAccumulator::new(width),
            separator,
            records_written: 0,
        }
    }

    /// Append a line's bytes, writing every record they complete.
    pub fn consume(&mut self, line: &Line) -> Result<()> {
        for &byte in line.as_bytes() {
            if let Some(record) = self.accumulator.push(byte) {
                self.emit(&record)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, record: &Record) -> Result<()> {
        self.writer
            .write_all(record.as_bytes())
            .and_then(|()| self.writer.write_all(&[self.separator]))
            .and_then(|()| self.writer.flush())
            .map_err(|source| PipelineError::SinkWrite { source })?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes held back waiting for the next record to fill.
    pub fn pending(&self) -> usize {
        self.accumulator.pending()
    }

    /// End of stream: drop the partial record and hand back the writer.
    pub fn finish(mut self) -> (W, OutputSummary) {
        let discarded_bytes = self.accumulator.discard();
        if discarded_bytes > 0 {
            debug!(
                "{OUTPUT_STAGE}: discarding {discarded_bytes} trailing byte(s) short of a {}-byte record",
                self.accumulator.width()
            );
        }
        let summary = OutputSummary {
            records_written: self.records_written,
            discarded_bytes,
        };
        (self.writer, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn fold(s: &str) -> String {
        let (out, _) = fold_pairs(s.as_bytes(), b'+', b'^');
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_fold_odd_run() {
        assert_eq!(fold("abc+++def"), "abc^+def");
    }

    #[test]
    fn test_fold_even_run() {
        assert_eq!(fold("abc++++def"), "abc^^def");
    }

    #[test]
    fn test_fold_run_of_five() {
        assert_eq!(fold("x+++++y"), "x^^+y");
    }

    #[test]
    fn test_fold_edges() {
        assert_eq!(fold(""), "");
        assert_eq!(fold("+"), "+");
        assert_eq!(fold("++"), "^");
        assert_eq!(fold("+a+"), "+a+");
        assert_eq!(fold("++a++"), "^a^");
    }

    #[test]
    fn test_fold_does_not_rescan_output() {
        // A fold byte equal to plus must not pair with what follows.
        let (out, pairs) = fold_pairs(b"+++", b'+', b'+');
        assert_eq!(out, b"++");
        assert_eq!(pairs, 1);
    }

    #[test]
    fn test_fold_length_shrinks_by_pairs() {
        let input = b"a++b+++c++++d";
        let (out, pairs) = fold_pairs(input, b'+', b'^');
        assert_eq!(pairs, 4);
        assert_eq!(out.len(), input.len() - pairs);
    }

    #[test]
    fn test_plus_fold_stage_counts_pairs() {
        let mut stage = PlusFoldStage::new(b'+', b'^');
        let out = stage.process(Line::from_str("a++b\n"));
        assert_eq!(out.as_bytes(), b"a^b\n");
        stage.process(Line::from_str("++++"));
        assert_eq!(stage.pairs_folded(), 3);
        assert_eq!(stage.name(), "plus-fold");
    }

    #[test]
    fn test_separator_stage() {
        let mut stage = SeparatorStage::new(b'\n');
        let out = stage.process(Line::from_str("hello\n"));
        assert_eq!(out.as_bytes(), b"hello ");
        assert_eq!(stage.name(), "separator");
    }

    #[test]
    fn test_separator_leaves_other_bytes() {
        let mut stage = SeparatorStage::new(b'\n');
        let out = stage.process(Line::from_str("a\tb+c"));
        assert_eq!(out.as_bytes(), b"a\tb+c");
    }

    #[test]
    fn test_output_stage_writes_full_records() {
        let mut stage = OutputStage::new(Vec::new(), 4, b'\n');
        stage.consume(&Line::from_str("abc")).unwrap();
        assert_eq!(stage.records_written(), 0);
        stage.consume(&Line::from_str("defghij")).unwrap();
        assert_eq!(stage.records_written(), 2);
        assert_eq!(stage.pending(), 2);
        let (written, summary) = stage.finish();
        assert_eq!(written, b"abcd\nefgh\n");
        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.discarded_bytes, 2);
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_stage_reports_sink_failure() {
        let mut stage = OutputStage::new(BrokenSink, 2, b'\n');
        stage.consume(&Line::from_str("a")).unwrap();
        assert!(matches!(
            stage.consume(&Line::from_str("b")),
            Err(PipelineError::SinkWrite { .. })
        ));
    }
}
