//! Plugin registry.
//!
//! Providers, guests, and communicators are all plugin-keyed factories:
//! a token maps to a constructor producing a value that conforms to the
//! matching capability trait. Dispatch is always by registered key or
//! detection predicate, never by runtime type inspection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::communicator::CommunicatorFactory;
use crate::error::{CoreError, Result};
use crate::guest::GuestPlugin;
use crate::provider::ProviderFactory;

/// Registry of provider, guest, and communicator plugins.
///
/// Guest plugins keep their registration order; guest resolution iterates
/// them in that order.
#[derive(Default)]
pub struct PluginRegistry {
    providers: RwLock<HashMap<String, ProviderFactory>>,
    guests: RwLock<Vec<(String, Arc<dyn GuestPlugin>)>>,
    communicators: RwLock<HashMap<String, CommunicatorFactory>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider factory under `name`, replacing any previous
    /// registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn register_provider(&self, name: impl Into<String>, factory: ProviderFactory) -> Result<()> {
        let name = name.into();
        tracing::debug!(provider = %name, "registering provider");
        self.providers
            .write()
            .map_err(|_| CoreError::Machine("registry lock poisoned".to_string()))?
            .insert(name, factory);
        Ok(())
    }

    /// Looks up a provider factory.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<ProviderFactory> {
        self.providers.read().ok()?.get(name).cloned()
    }

    /// Registers a guest plugin under a unique `key`.
    ///
    /// Re-registering an existing key replaces the plugin in place,
    /// keeping its position in the resolution order.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn register_guest(&self, key: impl Into<String>, plugin: Arc<dyn GuestPlugin>) -> Result<()> {
        let key = key.into();
        tracing::debug!(guest = %key, "registering guest");
        let mut guests = self
            .guests
            .write()
            .map_err(|_| CoreError::Machine("registry lock poisoned".to_string()))?;
        match guests.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = plugin,
            None => guests.push((key, plugin)),
        }
        Ok(())
    }

    /// Snapshot of registered guest plugins, in registration order.
    #[must_use]
    pub fn guests(&self) -> Vec<(String, Arc<dyn GuestPlugin>)> {
        self.guests
            .read()
            .map(|guests| guests.clone())
            .unwrap_or_default()
    }

    /// Registers a communicator factory under `name`, replacing any
    /// previous registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn register_communicator(
        &self,
        name: impl Into<String>,
        factory: CommunicatorFactory,
    ) -> Result<()> {
        let name = name.into();
        tracing::debug!(communicator = %name, "registering communicator");
        self.communicators
            .write()
            .map_err(|_| CoreError::Machine("registry lock poisoned".to_string()))?
            .insert(name, factory);
        Ok(())
    }

    /// Looks up a communicator factory.
    #[must_use]
    pub fn communicator(&self, name: &str) -> Option<CommunicatorFactory> {
        self.communicators.read().ok()?.get(name).cloned()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}
