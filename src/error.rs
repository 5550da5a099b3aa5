//! Pipeline error taxonomy
//!
//! Two kinds are absorbed where they happen and never abort a run:
//! [`PipelineError::SourceUnavailable`] (the worker contributes zeros) and
//! [`PipelineError::MalformedRecord`] (the line is skipped). The other two are
//! structural and propagate up to `main`, which aborts the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The traffic data file could not be opened or read
    #[error("traffic data source unavailable: {}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line that does not match `HH:MM Light<N> <count>`
    #[error("malformed traffic record: {line:?}")]
    MalformedRecord { line: String },

    /// The report destination could not be opened or written
    #[error("report sink unavailable: {}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any failed exchange between the coordinator and a worker
    #[error("communication with rank {rank} failed: {reason}")]
    Communication { rank: usize, reason: String },
}

impl PipelineError {
    pub fn communication(rank: usize, reason: impl Into<String>) -> Self {
        Self::Communication {
            rank,
            reason: reason.into(),
        }
    }
}
