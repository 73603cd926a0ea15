//! CLI entry point: run the line pipeline from stdin to stdout.
//!
//! Usage:
//!   line-fold < input.txt
//!   line-fold input.txt -o records.txt --width 80
//!
//! With no arguments, reads standard input until a `STOP` line and writes
//! 80-byte records to standard output.

use clap::Parser;
use env_logger::Env;
use line_fold::{LongLinePolicy, Pipeline, PipelineConfig, PipelineError, PipelineReport};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Fold "++" into "^" and re-chunk text into fixed-width records.
#[derive(Parser)]
#[command(name = "line-fold")]
struct Cli {
    /// Input text file (default: stdin)
    input: Option<PathBuf>,

    /// Write records to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Record width in bytes
    #[arg(long, default_value_t = line_fold::RECORD_WIDTH)]
    width: usize,

    /// Lines each hand-off queue can hold
    #[arg(long, default_value_t = line_fold::config::DEFAULT_QUEUE_CAPACITY)]
    capacity: usize,

    /// Longest accepted input line, terminator included
    #[arg(long, default_value_t = line_fold::MAX_LINE)]
    max_line: usize,

    /// Line that ends input processing
    #[arg(long, default_value = line_fold::config::DEFAULT_SENTINEL)]
    sentinel: String,

    /// Fail on overlong lines instead of truncating them
    #[arg(long)]
    reject_long_lines: bool,

    /// Log stage progress and print a run summary on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> PipelineConfig {
        let long_lines = if self.reject_long_lines {
            LongLinePolicy::Reject
        } else {
            LongLinePolicy::Truncate
        };
        PipelineConfig::default()
            .with_record_width(self.width)
            .with_queue_capacity(self.capacity)
            .with_max_line(self.max_line)
            .with_sentinel(self.sentinel.clone())
            .with_long_lines(long_lines)
    }
}

fn open_input(path: Option<&Path>) -> io::Result<Box<dyn BufRead + Send>> {
    match path {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            Ok(Box::new(BufWriter::new(File::create(path)?)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn run(cli: &Cli) -> Result<PipelineReport, PipelineError> {
    let pipeline = Pipeline::new(cli.config())?;
    let input = open_input(cli.input.as_deref())
        .map_err(|source| PipelineError::SourceRead { source })?;
    let output = open_output(cli.output.as_deref())
        .map_err(|source| PipelineError::SinkWrite { source })?;
    pipeline.run(input, output)
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if cli.verbose {
        eprintln!(
            "Input:    {}",
            cli.input
                .as_deref()
                .map_or("(stdin)".into(), |p| p.display().to_string())
        );
        eprintln!(
            "Output:   {}",
            cli.output
                .as_deref()
                .map_or("(stdout)".into(), |p| p.display().to_string())
        );
    }

    match run(&cli) {
        Ok(report) => {
            if cli.verbose {
                eprintln!(
                    "Lines:    {} read, {} truncated, sentinel {}",
                    report.lines_read,
                    report.lines_truncated,
                    if report.sentinel_seen { "seen" } else { "not seen" }
                );
                eprintln!(
                    "Records:  {} written, {} byte(s) discarded, {} pair(s) folded",
                    report.records_written, report.discarded_bytes, report.pairs_folded
                );
            }
        }
        Err(e) => {
            eprintln!("line-fold: {} stage: {e}", e.stage());
            process::exit(1);
        }
    }
}
