//! Errors surfaced by a predictor

use thiserror::Error;

/// Errors that can escape a suggestion query
///
/// Errors raised inside the predictor body itself never show up here: they
/// are trapped, reported on the diagnostic channel and turned into an empty
/// package.
#[derive(Debug, Error)]
pub enum PredictorError {
    /// The composite script could not be run at all (e.g. a syntax error)
    #[error("{kind}: {message}")]
    Script {
        /// Category of the failure, e.g. `ParseError`
        kind: String,
        /// Human readable description
        message: String,
    },
    /// The predictor body produced something other than text or a suggestion
    #[error(
        "predictor scripts should only output strings or suggestion records. \
         Detected invalid object type: {type_name}"
    )]
    MalformedOutput {
        /// Runtime type of the offending item
        type_name: String,
    },
    /// The configuration cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The context pool was shut down while waiting for a context
    #[error("context pool closed")]
    PoolClosed,
    /// The worker running the invocation panicked or was aborted
    #[error("invocation worker failed: {0}")]
    Join(String),
}

impl PredictorError {
    /// Short category name used when reporting the error.
    pub fn kind(&self) -> &str {
        match self {
            Self::Script { kind, .. } => kind,
            Self::MalformedOutput { .. } => "MalformedOutputError",
            Self::InvalidConfig(_) => "InvalidConfigError",
            Self::PoolClosed => "PoolClosedError",
            Self::Join(_) => "JoinError",
        }
    }

    /// Error message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Script { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
