//! Error types for the line pipeline.

use std::io;

use thiserror::Error;

/// Errors that stop a pipeline stage.
///
/// A queue running out of room is not an error here: producers block until
/// the consumer frees a slot.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input line exceeded the configured maximum and long lines are rejected.
    #[error("input line of {len} bytes exceeds the {max}-byte limit")]
    LineTooLong { len: usize, max: usize },

    /// The input source failed for a reason other than end of stream.
    #[error("failed to read input: {source}")]
    SourceRead { source: io::Error },

    /// The output sink rejected a record.
    #[error("failed to write output record: {source}")]
    SinkWrite { source: io::Error },

    /// A push found that the downstream stage stopped consuming.
    #[error("downstream of the {stage} stage stopped consuming")]
    ConsumerGone { stage: &'static str },

    /// A stage thread panicked.
    #[error("{stage} stage panicked")]
    StagePanicked { stage: &'static str },

    /// A stage thread could not be started.
    #[error("failed to start {stage} stage: {source}")]
    Spawn {
        stage: &'static str,
        source: io::Error,
    },

    /// The pipeline configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Name of the stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::LineTooLong { .. } | PipelineError::SourceRead { .. } => {
                crate::stage::INPUT_STAGE
            }
            PipelineError::SinkWrite { .. } => crate::stage::OUTPUT_STAGE,
            PipelineError::ConsumerGone { stage }
            | PipelineError::StagePanicked { stage }
            | PipelineError::Spawn { stage, .. } => stage,
            PipelineError::InvalidConfig(_) => "config",
        }
    }

    /// True for the secondary error a producer sees after its consumer failed.
    pub fn is_consumer_gone(&self) -> bool {
        matches!(self, PipelineError::ConsumerGone { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution() {
        let err = PipelineError::SourceRead {
            source: io::Error::other("boom"),
        };
        assert_eq!(err.stage(), "input");

        let err = PipelineError::SinkWrite {
            source: io::Error::other("boom"),
        };
        assert_eq!(err.stage(), "output");

        let err = PipelineError::ConsumerGone { stage: "plus-fold" };
        assert_eq!(err.stage(), "plus-fold");
        assert!(err.is_consumer_gone());
    }

    #[test]
    fn test_display() {
        let err = PipelineError::LineTooLong { len: 1200, max: 1000 };
        assert_eq!(
            err.to_string(),
            "input line of 1200 bytes exceeds the 1000-byte limit"
        );
    }
}
