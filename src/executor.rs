//! Stage runners and the sequential reference executor.
//!
//! Each `run_*` function is the body of one pipeline thread. Runners own the
//! shutdown protocol for their queues:
//!
//! - the input runner raises the [`ShutdownSignal`] and finishes queue A on
//!   every exit path;
//! - every runner finishes its output queue on exit;
//! - a runner that fails (or panics) abandons its input queue so its producer
//!   unblocks instead of waiting on a consumer that is gone.
//!
//! [`execute_sequential`] pushes each line through the same stage objects on
//! the calling thread. It produces byte-identical output to the threaded
//! pipeline and serves as the reference in tests.

use std::io::{BufRead, Write};
use std::thread;

use log::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::line::{Line, LineReader};
use crate::queue::BoundedQueue;
use crate::signal::ShutdownSignal;
use crate::stage::{
    INPUT_STAGE, LineStage, OUTPUT_STAGE, OutputStage, OutputSummary, PlusFoldStage,
    SeparatorStage,
};

/// Lifecycle of a consuming stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Running,
    /// Shutdown observed; emptying the input queue.
    Draining,
    Terminated,
}

/// Tracks one consuming stage through [`StageState`].
#[derive(Debug)]
pub struct Lifecycle {
    stage: &'static str,
    state: StageState,
}

impl Lifecycle {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            state: StageState::Running,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// Check the shutdown signal at the top of a loop iteration.
    ///
    /// Moves to draining only while lines remain queued; an empty queue after
    /// shutdown goes straight to termination on the next pop.
    pub fn observe(&mut self, signal: &ShutdownSignal, queued: usize) {
        if self.state == StageState::Running && queued > 0 && signal.is_raised() {
            self.state = StageState::Draining;
            debug!(
                "{}: shutdown observed, draining {queued} queued line(s)",
                self.stage
            );
        }
    }

    pub fn terminate(&mut self) {
        self.state = StageState::Terminated;
        debug!("{}: terminated", self.stage);
    }
}

/// Closes a stage's queues when its runner returns or unwinds.
struct Teardown<'a> {
    signal: Option<&'a ShutdownSignal>,
    upstream: Option<&'a BoundedQueue<Line>>,
    downstream: Option<&'a BoundedQueue<Line>>,
    failed: bool,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal {
            signal.raise();
        }
        if (self.failed || thread::panicking())
            && let Some(queue) = self.upstream
        {
            queue.abandon();
        }
        if let Some(queue) = self.downstream {
            queue.finish();
        }
    }
}

/// What the input stage did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSummary {
    /// Lines read before the sentinel, not counting the sentinel itself.
    pub lines_read: u64,
    pub lines_truncated: u64,
    pub sentinel_seen: bool,
}

/// Read lines into `output` until the sentinel, end of stream or an error.
///
/// The signal is raised and `output` finished on every exit path, so queued
/// lines always drain downstream.
pub fn run_input<R: BufRead>(
    mut reader: LineReader<R>,
    sentinel: &[u8],
    signal: &ShutdownSignal,
    output: &BoundedQueue<Line>,
) -> Result<InputSummary> {
    let _teardown = Teardown {
        signal: Some(signal),
        upstream: None,
        downstream: Some(output),
        failed: false,
    };

    let mut summary = InputSummary::default();
    loop {
        let line = match reader.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("{INPUT_STAGE}: end of input without sentinel");
                break;
            }
            Err(e) => {
                error!("{INPUT_STAGE}: {e}; draining queued lines");
                return Err(e);
            }
        };
        if !reader.last_was_truncated() && line.as_bytes() == sentinel {
            summary.sentinel_seen = true;
            info!(
                "{INPUT_STAGE}: sentinel after {} line(s), shutting down",
                summary.lines_read
            );
            break;
        }
        summary.lines_read += 1;
        output
            .push(line)
            .map_err(|_| PipelineError::ConsumerGone { stage: INPUT_STAGE })?;
    }
    summary.lines_truncated = reader.truncated();
    Ok(summary)
}

/// Move lines from `input` to `output` through `stage` until `input` is done.
///
/// Returns the number of lines processed.
pub fn run_transform<S: LineStage>(
    stage: &mut S,
    signal: &ShutdownSignal,
    input: &BoundedQueue<Line>,
    output: &BoundedQueue<Line>,
) -> Result<u64> {
    let mut teardown = Teardown {
        signal: None,
        upstream: Some(input),
        downstream: Some(output),
        failed: false,
    };

    let name = stage.name();
    let mut lifecycle = Lifecycle::new(name);
    let mut processed = 0;
    loop {
        lifecycle.observe(signal, input.len());
        let Some(line) = input.pop() else {
            break;
        };
        if output.push(stage.process(line)).is_err() {
            teardown.failed = true;
            return Err(PipelineError::ConsumerGone { stage: name });
        }
        processed += 1;
    }
    lifecycle.terminate();
    Ok(processed)
}

/// Drain `input` into `stage`, writing records as they fill.
pub fn run_output<W: Write>(
    mut stage: OutputStage<W>,
    signal: &ShutdownSignal,
    input: &BoundedQueue<Line>,
) -> Result<(W, OutputSummary)> {
    let mut teardown = Teardown {
        signal: None,
        upstream: Some(input),
        downstream: None,
        failed: false,
    };

    let mut lifecycle = Lifecycle::new(OUTPUT_STAGE);
    loop {
        lifecycle.observe(signal, input.len());
        let Some(line) = input.pop() else {
            break;
        };
        if let Err(e) = stage.consume(&line) {
            teardown.failed = true;
            return Err(e);
        }
    }
    lifecycle.terminate();
    Ok(stage.finish())
}

/// Counters from a sequential run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequentialSummary {
    pub input: InputSummary,
    pub pairs_folded: u64,
    pub output: OutputSummary,
}

/// Run all four steps on the calling thread, one line at a time.
pub fn execute_sequential<R: BufRead, W: Write>(
    input: R,
    output: W,
    config: &PipelineConfig,
) -> Result<(W, SequentialSummary)> {
    config.validate()?;

    let mut reader = LineReader::new(input, config.max_line, config.long_lines);
    let sentinel = config.sentinel_line();
    let mut separator = SeparatorStage::new(config.separator);
    let mut plus_fold = PlusFoldStage::new(config.plus, config.fold);
    let mut sink = OutputStage::new(output, config.record_width, config.separator);
    let mut input_summary = InputSummary::default();

    while let Some(line) = reader.read_line()? {
        if !reader.last_was_truncated() && line.as_bytes() == sentinel.as_slice() {
            input_summary.sentinel_seen = true;
            break;
        }
        input_summary.lines_read += 1;
        let line = plus_fold.process(separator.process(line));
        sink.consume(&line)?;
    }
    input_summary.lines_truncated = reader.truncated();

    let (writer, output_summary) = sink.finish();
    let summary = SequentialSummary {
        input: input_summary,
        pairs_folded: plus_fold.pairs_folded(),
        output: output_summary,
    };
    Ok((writer, summary))
}

/// Transform an in-memory input into the bytes the pipeline would write.
pub fn transform_text(input: &[u8], config: &PipelineConfig) -> Result<Vec<u8>> {
    let (output, _) = execute_sequential(input, Vec::new(), config)?;
    Ok(output)
}
