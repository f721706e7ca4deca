//! Host execution context.
//!
//! Kernels report human-readable failure text through an [`OpContext`] before
//! returning an error. Hosts plug in their own sink; [`LoggingContext`] sends
//! reports to `tracing` and keeps them for inspection.

use tracing::error;

/// Error channel provided by the host.
pub trait OpContext {
    fn report_error(&mut self, message: &str);
}

/// Context that logs reports and remembers them.
#[derive(Debug, Default)]
pub struct LoggingContext {
    reports: Vec<String>,
}

impl LoggingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages reported so far, oldest first.
    pub fn reports(&self) -> &[String] {
        &self.reports
    }

    pub fn last_report(&self) -> Option<&str> {
        self.reports.last().map(String::as_str)
    }

    /// Drains collected reports.
    pub fn take_reports(&mut self) -> Vec<String> {
        std::mem::take(&mut self.reports)
    }
}

impl OpContext for LoggingContext {
    fn report_error(&mut self, message: &str) {
        error!(%message, "Op failed");
        self.reports.push(message.to_string());
    }
}

/// Context that discards reports.
#[derive(Debug, Default)]
pub struct NullContext;

impl OpContext for NullContext {
    fn report_error(&mut self, _message: &str) {}
}

/// Reports `err` through `ctx` and hands it back for propagation.
pub fn report<E: std::fmt::Display>(ctx: &mut dyn OpContext, err: E) -> E {
    ctx.report_error(&err.to_string());
    err
}
