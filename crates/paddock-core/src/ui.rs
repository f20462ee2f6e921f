//! Output sinks for machine-scoped messages.
//!
//! The core never renders anything itself; it hands lines to whatever
//! [`Ui`] the caller installed. A machine's sink can be swapped for the
//! duration of a scoped operation via `Machine::with_ui`.

/// A sink for user-facing output lines.
pub trait Ui: Send + Sync {
    /// Reports an informational message.
    fn info(&self, message: &str);

    /// Reports a warning.
    fn warn(&self, message: &str);

    /// Reports an error.
    fn error(&self, message: &str);
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentUi;

impl Ui for SilentUi {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Forwards output to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn info(&self, message: &str) {
        tracing::info!(target: "paddock::ui", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "paddock::ui", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "paddock::ui", "{message}");
    }
}
