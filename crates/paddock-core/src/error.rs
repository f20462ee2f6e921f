//! Error types for the core layer.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The provider has no handler for the requested action.
    #[error("provider `{provider}` has no implementation for action `{action}`")]
    UnimplementedProviderAction {
        /// Requested action name.
        action: String,
        /// Provider backend name.
        provider: String,
    },

    /// The machine's communication channel is not ready for guest commands.
    #[error("machine `{machine}` is not ready for guest commands")]
    MachineGuestNotReady {
        /// Machine name.
        machine: String,
    },

    /// The provider returned a malformed machine state.
    #[error("provider for machine `{machine}` returned an invalid state")]
    MachineStateInvalid {
        /// Machine name.
        machine: String,
    },

    /// No registered guest plugin accepted the machine.
    #[error("no registered guest matched machine `{machine}`")]
    GuestNotDetected {
        /// Machine name.
        machine: String,
    },

    /// The guest capability chain was exhausted without a match.
    #[error("guest `{guest}` does not support capability `{capability}`")]
    GuestCapabilityNotFound {
        /// Requested capability name.
        capability: String,
        /// Active guest key.
        guest: String,
    },

    /// No provider factory is registered under the given name.
    #[error("no provider registered under `{name}`")]
    ProviderNotFound {
        /// Provider name.
        name: String,
    },

    /// No communicator factory is registered under the given name.
    #[error("no communicator registered under `{name}`")]
    CommunicatorNotFound {
        /// Communicator name.
        name: String,
    },

    /// Persisted machine state could not be read or written.
    #[error("failed to persist machine state at {}: {source}", .path.display())]
    Persistence {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Provider error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Machine error.
    #[error("machine error: {0}")]
    Machine(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more batch entries failed.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Aggregate failure from a batch run.
///
/// Produced only after every batch worker has finished; a failure in one
/// group never hides a failure in another.
#[derive(Debug)]
pub struct BatchError {
    failures: Vec<BatchFailure>,
}

/// A single failed batch entry.
#[derive(Debug)]
pub struct BatchFailure {
    /// Name of the machine the entry targeted.
    pub machine: String,
    /// Action name that failed.
    pub action: String,
    /// Underlying cause.
    pub error: CoreError,
}

impl BatchError {
    pub(crate) fn new(failures: Vec<BatchFailure>) -> Self {
        Self { failures }
    }

    /// Every failed (machine, action) pair with its cause.
    #[must_use]
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch run failed for {} action(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(
                f,
                "\n  machine `{}`, action `{}`: {}",
                failure.machine, failure.action, failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}
