//! Communication channel capability contract.

use std::sync::Arc;

use crate::error::Result;
use crate::machine::Machine;

/// Communicator key used when the configuration does not select one.
pub const DEFAULT_COMMUNICATOR: &str = "ssh";

/// Constructor for a machine's communication channel.
pub type CommunicatorFactory = Arc<dyn Fn(&Machine) -> Result<Arc<dyn Communicator>> + Send + Sync>;

/// Channel used to reach a machine's operating system.
///
/// Guest resolution is gated on [`ready`](Communicator::ready); command
/// execution is what guest capability implementations build on.
pub trait Communicator: Send + Sync {
    /// Whether the channel can accept commands.
    fn ready(&self) -> bool;

    /// Runs a command on the machine and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be executed.
    fn execute(&self, command: &str) -> Result<i32>;
}
