//! # line-fold
//!
//! A threaded text pipeline that re-chunks its input into fixed-width
//! 80-byte records, in the spirit of card-image batch processing.
//!
//! ## Overview
//!
//! Four stages run concurrently, connected by three bounded queues:
//! - **input**: reads lines until the `STOP` line or end of input
//! - **separator**: turns every line separator into a space
//! - **plus-fold**: folds each `++` pair into `^`, left to right
//! - **output**: writes exactly-80-byte records, dropping a short remainder
//!
//! Producers block on full queues, so input of any length is handled with a
//! fixed amount of buffering. End of input travels downstream through a
//! shared shutdown signal and each queue's finish flag; every line read
//! before the sentinel reaches the output.
//!
//! ## Example
//!
//! ```
//! use line_fold::{PipelineConfig, run_bytes};
//!
//! let config = PipelineConfig::default().with_record_width(4);
//! let (output, report) = run_bytes(b"abc++++def\nSTOP\nlost\n", config).unwrap();
//!
//! // "abc^^def " re-chunked into 4-byte records; the trailing space is dropped
//! assert_eq!(output, b"abc^\n^def\n");
//! assert_eq!(report.discarded_bytes, 1);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod line;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod signal;
pub mod stage;

pub use config::{LongLinePolicy, PipelineConfig};
pub use error::{PipelineError, Result};
pub use executor::{execute_sequential, transform_text};
pub use line::{LINE_SEPARATOR, Line, LineReader, MAX_LINE};
pub use pipeline::{Pipeline, PipelineReport, run_bytes};
pub use queue::BoundedQueue;
pub use record::{RECORD_WIDTH, Record, RecordAccumulator};
pub use signal::ShutdownSignal;
pub use stage::{LineStage, OutputStage, PlusFoldStage, SeparatorStage, fold_pairs};
