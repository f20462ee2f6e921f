//! Provider capability contract.
//!
//! A provider backend (hypervisor, cloud API, container runtime) is
//! consumed through this interface only; no concrete driver lives in the
//! core.

use std::sync::Arc;

use crate::connection::ProviderConnectionInfo;
use crate::error::Result;
use crate::machine::{ActionContext, Machine};
use crate::state::MachineState;

/// A callable action implementation supplied by a provider.
///
/// The callable runs synchronously and may mutate the context it is
/// given, in particular set a `result` entry.
pub type ProviderAction = Arc<dyn Fn(&mut ActionContext) -> Result<()> + Send + Sync>;

/// Constructor for a provider backend.
///
/// Invoked exactly once per machine, with the fully-initialized machine
/// as its sole argument. The factory may read the machine's name,
/// configuration, base image, data directory, and persisted ID during
/// its own initialization; `Machine::provider` reports absence until the
/// factory returns.
pub type ProviderFactory = Arc<dyn Fn(&Machine) -> Result<Box<dyn Provider>> + Send + Sync>;

/// Provider backend capability.
pub trait Provider: Send + Sync {
    /// Looks up the callable implementation for a named action.
    ///
    /// Returns `None` if the provider does not implement the action.
    fn action(&self, name: &str) -> Option<ProviderAction>;

    /// Queries the current machine state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    fn state(&self) -> Result<MachineState>;

    /// Reports raw connection data, or `None` if the machine cannot be
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    fn connection_info(&self) -> Result<Option<ProviderConnectionInfo>>;

    /// Notified synchronously after every persisted-ID write, including
    /// clears.
    fn machine_id_changed(&self);
}
