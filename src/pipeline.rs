//! Threaded four-stage pipeline.
//!
//! ```text
//! input --A--> separator --B--> plus-fold --C--> output
//! ```
//!
//! Every stage runs on its own scoped thread. The three queues carry lines;
//! the shared [`ShutdownSignal`] and each queue's finish flag carry the end of
//! input downstream, so every line read before the sentinel reaches the sink.

use std::io::{BufRead, Write};
use std::thread::{self, Scope, ScopedJoinHandle};

use log::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::executor::{run_input, run_output, run_transform};
use crate::line::LineReader;
use crate::queue::BoundedQueue;
use crate::signal::ShutdownSignal;
use crate::stage::{
    INPUT_STAGE, OUTPUT_STAGE, OutputStage, PLUS_FOLD_STAGE, PlusFoldStage, SEPARATOR_STAGE,
    SeparatorStage,
};

/// Counters from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Lines read before the sentinel or end of input.
    pub lines_read: u64,
    pub lines_truncated: u64,
    pub sentinel_seen: bool,
    pub lines_separated: u64,
    pub lines_folded: u64,
    pub pairs_folded: u64,
    pub records_written: u64,
    /// Trailing bytes dropped because they never filled a record.
    pub discarded_bytes: usize,
    /// Largest depth observed on queues A, B and C.
    pub peak_queue_depths: [usize; 3],
}

/// A configured pipeline, ready to run against an input and a sink.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run all four stages until the input ends, then join them.
    ///
    /// On failure the error of the stage that failed first in pipeline order
    /// is returned; a producer that merely lost its consumer is reported only
    /// when nothing else failed.
    pub fn run<R, W>(&self, input: R, output: W) -> Result<PipelineReport>
    where
        R: BufRead + Send,
        W: Write + Send,
    {
        let config = &self.config;
        let signal = &ShutdownSignal::new();
        let raw = &BoundedQueue::new("raw", config.queue_capacity);
        let spaced = &BoundedQueue::new("spaced", config.queue_capacity);
        let folded = &BoundedQueue::new("folded", config.queue_capacity);

        let reader = LineReader::new(input, config.max_line, config.long_lines);
        let sentinel = config.sentinel_line();
        let sentinel = sentinel.as_slice();
        let mut separator = SeparatorStage::new(config.separator);
        let mut plus_fold = PlusFoldStage::new(config.plus, config.fold);
        let separator_stage = &mut separator;
        let plus_fold_stage = &mut plus_fold;
        let sink = OutputStage::new(output, config.record_width, config.separator);

        debug!(
            "starting pipeline: width={} capacity={} max_line={}",
            config.record_width, config.queue_capacity, config.max_line
        );

        let (input, separated, folded_lines, written) = thread::scope(|scope| {
            // Started threads are still joined by the scope; the input stage
            // only sees the abandoned queue once its current read returns.
            let abort = |e: PipelineError| {
                signal.raise();
                for queue in [raw, spaced, folded] {
                    queue.abandon();
                }
                e
            };

            let input = spawn_stage(scope, INPUT_STAGE, move || {
                run_input(reader, sentinel, signal, raw)
            })
            .map_err(abort)?;
            let separated = spawn_stage(scope, SEPARATOR_STAGE, move || {
                run_transform(separator_stage, signal, raw, spaced)
            })
            .map_err(abort)?;
            let folded_lines = spawn_stage(scope, PLUS_FOLD_STAGE, move || {
                run_transform(plus_fold_stage, signal, spaced, folded)
            })
            .map_err(abort)?;
            let written = spawn_stage(scope, OUTPUT_STAGE, move || {
                run_output(sink, signal, folded)
            })
            .map_err(abort)?;

            Ok::<_, PipelineError>((
                join_stage(INPUT_STAGE, input),
                join_stage(SEPARATOR_STAGE, separated),
                join_stage(PLUS_FOLD_STAGE, folded_lines),
                join_stage(OUTPUT_STAGE, written),
            ))
        })?;

        let report = match (input, separated, folded_lines, written) {
            (Ok(input), Ok(separated), Ok(folded_lines), Ok((_, output))) => PipelineReport {
                lines_read: input.lines_read,
                lines_truncated: input.lines_truncated,
                sentinel_seen: input.sentinel_seen,
                lines_separated: separated,
                lines_folded: folded_lines,
                pairs_folded: plus_fold.pairs_folded(),
                records_written: output.records_written,
                discarded_bytes: output.discarded_bytes,
                peak_queue_depths: [raw.high_water(), spaced.high_water(), folded.high_water()],
            },
            (input, separated, folded_lines, written) => {
                let failures = [
                    input.err(),
                    separated.err(),
                    folded_lines.err(),
                    written.err(),
                ];
                return Err(root_cause(failures.into_iter().flatten().collect()));
            }
        };

        info!(
            "{} line(s) in -> {} record(s) out, {} byte(s) discarded",
            report.lines_read, report.records_written, report.discarded_bytes
        );
        Ok(report)
    }
}

fn spawn_stage<'scope, T, F>(
    scope: &'scope Scope<'scope, '_>,
    stage: &'static str,
    body: F,
) -> Result<ScopedJoinHandle<'scope, Result<T>>>
where
    T: Send + 'scope,
    F: FnOnce() -> Result<T> + Send + 'scope,
{
    thread::Builder::new()
        .name(format!("line-fold-{stage}"))
        .spawn_scoped(scope, body)
        .map_err(|source| PipelineError::Spawn { stage, source })
}

fn join_stage<T>(stage: &'static str, handle: ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .unwrap_or(Err(PipelineError::StagePanicked { stage }))
}

/// Pick the error to report from the failures of one run, in pipeline order.
///
/// `failures` must not be empty.
fn root_cause(mut failures: Vec<PipelineError>) -> PipelineError {
    let index = failures
        .iter()
        .position(|e| !e.is_consumer_gone())
        .unwrap_or(0);
    failures.swap_remove(index)
}

/// Run a pipeline over an in-memory input, collecting what it writes.
pub fn run_bytes(input: &[u8], config: PipelineConfig) -> Result<(Vec<u8>, PipelineReport)> {
    let pipeline = Pipeline::new(config)?;
    let mut output = Vec::new();
    let report = pipeline.run(input, &mut output)?;
    Ok((output, report))
}
