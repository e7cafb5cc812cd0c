//! Diagnostic channel
//!
//! Hosts drop failed or slow predictions without telling anyone. Everything
//! that goes wrong is therefore written here as a plain text line, in
//! addition to the usual `tracing` events.

use std::fmt;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A problem worth telling the script author about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The predictor body raised an error; the query returned no suggestions
    Trapped {
        /// Qualified identifier of the error
        kind: String,
        /// Error message
        message: String,
    },
    /// The query failed before (or after) the body ran and the error escaped
    Untrapped {
        /// Error category
        kind: String,
        /// Error message
        message: String,
    },
    /// The query finished but probably too late for the host to use it
    Slow {
        /// Measured wall clock time
        elapsed: Duration,
        /// Threshold that was exceeded
        threshold: Duration,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trapped { kind, message } => write!(f, "predictor error: {kind}: {message}"),
            Self::Untrapped { kind, message } => {
                write!(f, "untrapped predictor error - {kind}: {message}")
            }
            Self::Slow { elapsed, threshold } => write!(
                f,
                "warning: prediction took {}ms which may be longer than the host timeout \
                 (~{}ms). The host will probably drop these suggestions silently.",
                elapsed.as_millis(),
                threshold.as_millis()
            ),
        }
    }
}

/// Destination for diagnostic lines
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Writes diagnostics to stdout, each on a fresh line
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        // Leading newline keeps the message off the line being edited.
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "\n{diagnostic}");
        let _ = stdout.flush();
    }
}

/// Keeps diagnostics in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Recorded diagnostics rendered as lines.
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(ToString::to_string).collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.entries.lock().push(diagnostic.clone());
    }
}

/// Send a diagnostic to the sink and mirror it as a tracing event.
pub(crate) fn report(sink: &dyn DiagnosticSink, diagnostic: Diagnostic) {
    match &diagnostic {
        Diagnostic::Trapped { kind, message } => {
            tracing::warn!(kind = %kind, "predictor body raised an error: {message}");
        }
        Diagnostic::Untrapped { kind, message } => {
            tracing::error!(kind = %kind, "predictor query failed: {message}");
        }
        Diagnostic::Slow { elapsed, threshold } => {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                "slow prediction"
            );
        }
    }
    sink.emit(&diagnostic);
}
