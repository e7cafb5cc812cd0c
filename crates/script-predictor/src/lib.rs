//! Script predictor: command-line suggestions from user supplied scripts
//!
//! A [`ScriptPredictor`] evaluates a `rhai` script against the current input
//! line on every query and returns whatever suggestions the script produces.
//! Queries borrow an isolated [`ExecutionContext`] from a bounded, pre-warmed
//! [`ContextPool`], so concurrent keystrokes never share interpreter state
//! and no query pays for creating an engine from scratch.
//!
//! Hosts silently discard predictions that fail or arrive late, so every
//! failure and every slow query is written to a [`DiagnosticSink`].

mod config;
mod context;
mod diagnostics;
mod error;
mod invocation;
mod latency;
mod normalize;
mod pool;
mod predictor;
mod types;

pub use config::{DEFAULT_POOL_CAPACITY, DEFAULT_SLOW_THRESHOLD, PredictorConfig};
pub use context::ExecutionContext;
pub use diagnostics::{ConsoleSink, Diagnostic, DiagnosticSink, MemorySink};
pub use error::PredictorError;
pub use invocation::PredictorScript;
pub use latency::LatencyMonitor;
pub use normalize::{Candidate, IntoCandidate, normalize};
pub use pool::{ContextPool, PooledContext};
pub use predictor::{CommandPredictor, ScriptPredictor, ScriptPredictorBuilder};
pub use types::{
    ClientKind, FeedbackKind, PredictionClient, PredictionContext, PredictorIdentity, Suggestion,
    SuggestionPackage,
};
