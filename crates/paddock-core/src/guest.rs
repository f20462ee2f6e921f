//! Guest resolution and capability dispatch.
//!
//! Guest plugins are registered under unique keys; resolving a machine's
//! guest tests every plugin's detection predicate against the machine, in
//! registration order, and keeps the ones that accept it. The first entry
//! is the active guest; the rest stay reachable as capability fallbacks.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::machine::Machine;

/// A capability implementation supplied by a guest plugin.
pub type GuestCapability = Arc<dyn Fn(&Machine, Option<Value>) -> Result<Value> + Send + Sync>;

/// Guest-OS plugin capability.
pub trait GuestPlugin: Send + Sync {
    /// Whether this plugin recognizes the machine's operating system.
    fn detect(&self, machine: &Machine) -> bool;

    /// Looks up a capability implementation by name.
    fn capability(&self, name: &str) -> Option<GuestCapability> {
        let _ = name;
        None
    }
}

/// A resolved guest: the ordered capability chain for one machine.
///
/// Derived and non-persisted; recomputed on each resolution.
pub struct Guest {
    machine: Arc<Machine>,
    chain: Vec<(String, Arc<dyn GuestPlugin>)>,
}

impl Guest {
    /// Builds the capability chain for `machine`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::GuestNotDetected`] if no registered plugin
    /// accepts the machine.
    pub(crate) fn resolve(machine: Arc<Machine>) -> Result<Self> {
        let mut chain = Vec::new();
        for (key, plugin) in machine.env().registry().guests() {
            if plugin.detect(&machine) {
                tracing::trace!(machine = %machine.name(), guest = %key, "guest detected");
                chain.push((key, plugin));
            }
        }

        if chain.is_empty() {
            return Err(CoreError::GuestNotDetected {
                machine: machine.name().to_string(),
            });
        }

        Ok(Self { machine, chain })
    }

    /// Key of the active guest (the first chain entry).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.chain[0].0
    }

    /// The full capability chain, in resolution order.
    #[must_use]
    pub fn chain(&self) -> &[(String, Arc<dyn GuestPlugin>)] {
        &self.chain
    }

    /// Whether any chain entry implements the named capability.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.chain
            .iter()
            .any(|(_, plugin)| plugin.capability(name).is_some())
    }

    /// Invokes the named capability.
    ///
    /// The chain is consulted in order; the first plugin that recognizes
    /// the capability handles it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::GuestCapabilityNotFound`] if the chain is
    /// exhausted, or whatever the capability implementation fails with.
    pub fn capability(&self, name: &str, args: Option<Value>) -> Result<Value> {
        for (key, plugin) in &self.chain {
            if let Some(implementation) = plugin.capability(name) {
                tracing::debug!(
                    machine = %self.machine.name(),
                    guest = %key,
                    capability = %name,
                    "invoking guest capability"
                );
                return implementation(&self.machine, args);
            }
        }

        Err(CoreError::GuestCapabilityNotFound {
            capability: name.to_string(),
            guest: self.name().to_string(),
        })
    }
}

impl std::fmt::Debug for Guest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.chain.iter().map(|(key, _)| key.as_str()).collect();
        f.debug_struct("Guest")
            .field("machine", &self.machine.name())
            .field("chain", &keys)
            .finish()
    }
}
