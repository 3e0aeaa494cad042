//! Reporting of non-fatal problems found during synthesis

use tracing::warn;

/// Receiver of warnings that do not stop synthesis
pub trait ProblemReporter: Send + Sync {
    /// Report a problem with an optional hint on how to fix it
    fn report_warning(&self, message: &str, correction: Option<&str>);
}

/// Forwards problems to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ProblemReporter for TracingReporter {
    fn report_warning(&self, message: &str, correction: Option<&str>) {
        match correction {
            Some(correction) => warn!(correction, "{message}"),
            None => warn!("{message}"),
        }
    }
}
