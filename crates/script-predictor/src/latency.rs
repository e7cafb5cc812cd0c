//! Latency warnings
//!
//! Hosts enforce their own, undocumented, deadline and silently drop late
//! predictions. The monitor only observes: it never cancels or alters a
//! result.

use std::time::{Duration, Instant};

use crate::diagnostics::{Diagnostic, DiagnosticSink, report};

/// Warns when a query takes longer than a soft threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyMonitor {
    threshold: Duration,
}

impl LatencyMonitor {
    /// Monitor with the given threshold.
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// The warning threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Start timing a query.
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Finish timing a query started at `started`, warning through `sink`
    /// when it ran over the threshold. Returns the elapsed time.
    pub fn finish(&self, started: Instant, sink: &dyn DiagnosticSink) -> Duration {
        let elapsed = started.elapsed();
        tracing::trace!(elapsed_us = elapsed.as_micros() as u64, "prediction finished");
        if elapsed > self.threshold {
            report(
                sink,
                Diagnostic::Slow {
                    elapsed,
                    threshold: self.threshold,
                },
            );
        }
        elapsed
    }
}
