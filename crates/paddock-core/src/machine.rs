//! The machine entity.
//!
//! A machine owns its persisted identity, dispatches lifecycle actions to
//! its provider, resolves its connection info and guest, and exposes a
//! temporarily-overridable output sink. Providers, guests, and the
//! communicator are all consumed through capability traits; nothing here
//! knows about concrete backends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use crate::communicator::{Communicator, DEFAULT_COMMUNICATOR};
use crate::config::ProjectConfig;
use crate::connection::{ConnectionInfo, ConnectionInfoResolver};
use crate::environment::{BaseImage, Environment, Manifest};
use crate::error::{CoreError, Result};
use crate::guest::Guest;
use crate::persistence::MachineData;
use crate::provider::Provider;
use crate::state::MachineState;
use crate::ui::Ui;

/// Everything needed to construct a [`Machine`], minus the environment
/// back-references.
#[derive(Debug, Clone)]
pub struct MachineDefinition {
    /// Machine name, unique within the owning configuration document.
    pub name: String,
    /// Token of the provider backend to use.
    pub provider_name: String,
    /// Provider-specific configuration, carried through unmodified.
    pub provider_config: Value,
    /// Provider-specific options, carried through unmodified. Part of
    /// the batch grouping signature.
    pub provider_options: Value,
    /// Base image descriptor, if any.
    pub base_image: Option<BaseImage>,
    /// Directory exclusively owned by this machine for persisted state.
    pub data_dir: PathBuf,
}

/// Execution context handed to provider action implementations.
///
/// Seeded with the machine, its current output sink, and the caller's
/// extra options; the action may mutate the data map, in particular set
/// a `result` entry, and the mutated context is returned to the caller
/// of [`Machine::action`].
pub struct ActionContext {
    machine: Arc<Machine>,
    ui: Arc<dyn Ui>,
    data: HashMap<String, Value>,
}

impl ActionContext {
    /// Key under which the action name is seeded.
    pub const ACTION_NAME: &'static str = "action_name";
    /// Key conventionally used for an action's return value.
    pub const RESULT: &'static str = "result";

    fn new(machine: Arc<Machine>, ui: Arc<dyn Ui>, action_name: &str) -> Self {
        let mut data = HashMap::new();
        data.insert(
            Self::ACTION_NAME.to_string(),
            Value::String(action_name.to_string()),
        );
        Self { machine, ui, data }
    }

    /// Extra options take precedence over seeded context fields.
    fn merge_options(&mut self, options: Option<Value>) {
        match options {
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    self.data.insert(key, value);
                }
            }
            Some(other) => {
                self.data.insert("options".to_string(), other);
            }
            None => {}
        }
    }

    /// The machine this action runs against.
    #[must_use]
    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    /// The output sink in effect when the action was dispatched.
    #[must_use]
    pub fn ui(&self) -> &Arc<dyn Ui> {
        &self.ui
    }

    /// Reads a context entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Writes a context entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// Sets the action's return value.
    pub fn set_result(&mut self, value: Value) {
        self.data.insert(Self::RESULT.to_string(), value);
    }

    /// The action's return value, if one was set.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.data.get(Self::RESULT)
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("machine", &self.machine.name())
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// A compute resource managed through a provider backend.
pub struct Machine {
    name: String,
    provider_name: String,
    provider: OnceLock<Box<dyn Provider>>,
    provider_config: Value,
    provider_options: Value,
    config: Arc<ProjectConfig>,
    base_image: Option<BaseImage>,
    data: MachineData,
    env: Arc<Environment>,
    manifest: Arc<Manifest>,
    ui: RwLock<Arc<dyn Ui>>,
    communicator: OnceLock<Arc<dyn Communicator>>,
}

impl Machine {
    /// Constructs a machine and its provider.
    ///
    /// Construction is two-phase: every field is initialized into a fully
    /// valid value first, then the provider factory registered under the
    /// definition's `provider_name` is invoked exactly once with that
    /// value. The factory may read the machine back (name, config, base
    /// image, data directory, persisted ID); [`provider`](Self::provider)
    /// reports absence until the factory returns.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProviderNotFound`] if no factory is
    /// registered under the provider name, or whatever the factory fails
    /// with.
    pub fn new(
        definition: MachineDefinition,
        env: Arc<Environment>,
        manifest: Arc<Manifest>,
    ) -> Result<Arc<Self>> {
        let factory = env
            .registry()
            .provider(&definition.provider_name)
            .ok_or_else(|| CoreError::ProviderNotFound {
                name: definition.provider_name.clone(),
            })?;

        let machine = Arc::new(Self {
            name: definition.name,
            provider_name: definition.provider_name,
            provider: OnceLock::new(),
            provider_config: definition.provider_config,
            provider_options: definition.provider_options,
            config: Arc::clone(manifest.config()),
            base_image: definition.base_image,
            data: MachineData::new(definition.data_dir),
            ui: RwLock::new(env.ui()),
            env,
            manifest,
            communicator: OnceLock::new(),
        });

        let provider = factory(&machine)?;
        machine
            .provider
            .set(provider)
            .map_err(|_| CoreError::Machine("provider initialized twice".to_string()))?;

        tracing::debug!(
            machine = %machine.name,
            provider = %machine.provider_name,
            "initialized machine"
        );
        Ok(machine)
    }

    /// Machine name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token of the provider backend in use.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The provider backend.
    ///
    /// Absent only while the provider factory itself is running.
    #[must_use]
    pub fn provider(&self) -> Option<&dyn Provider> {
        self.provider.get().map(|provider| &**provider)
    }

    fn require_provider(&self) -> Result<&dyn Provider> {
        self.provider()
            .ok_or_else(|| CoreError::Machine(format!("provider for `{}` not initialized", self.name)))
    }

    /// Provider-specific configuration.
    #[must_use]
    pub fn provider_config(&self) -> &Value {
        &self.provider_config
    }

    /// Provider-specific options.
    #[must_use]
    pub fn provider_options(&self) -> &Value {
        &self.provider_options
    }

    /// Read-only root configuration document.
    #[must_use]
    pub fn config(&self) -> &Arc<ProjectConfig> {
        &self.config
    }

    /// Base image descriptor, if any.
    #[must_use]
    pub fn base_image(&self) -> Option<&BaseImage> {
        self.base_image.as_ref()
    }

    /// Directory holding this machine's persisted state.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data.dir()
    }

    /// The owning environment.
    #[must_use]
    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    /// The manifest this machine was defined in.
    #[must_use]
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// The current output sink.
    #[must_use]
    pub fn ui(&self) -> Arc<dyn Ui> {
        let ui = self
            .ui
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&ui)
    }

    /// Runs `operation` with `ui` installed as the machine's output sink.
    ///
    /// The previous sink is restored on every exit path, including when
    /// the operation panics.
    pub fn with_ui<R>(&self, ui: Arc<dyn Ui>, operation: impl FnOnce() -> R) -> R {
        let previous = {
            let mut slot = self
                .ui
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::replace(&mut *slot, ui)
        };
        let _restore = UiRestore {
            slot: &self.ui,
            previous: Some(previous),
        };
        operation()
    }

    /// The persisted machine ID.
    ///
    /// Read from the backing store on every call; an empty or missing
    /// file means no ID.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the backing store cannot be read.
    pub fn id(&self) -> Result<Option<String>> {
        self.data.read_id()
    }

    /// Sets or clears the persisted machine ID.
    ///
    /// The backing store is updated first, then the provider is notified
    /// via `machine_id_changed`. Both steps are part of the same
    /// operation: a failed store write surfaces an error and the
    /// notification does not run.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the backing store cannot be
    /// updated.
    pub fn set_id(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => self.data.write_id(id)?,
            None => self.data.clear_id()?,
        }
        self.require_provider()?.machine_id_changed();
        Ok(())
    }

    /// Dispatches a lifecycle action to the provider.
    ///
    /// Looks up the callable implementation for `name`, seeds an
    /// execution context with this machine, its current output sink, and
    /// `extra_options` (extra options take precedence over seeded
    /// fields), invokes the callable synchronously, and returns the
    /// mutated context. The callable runs with full authority over
    /// machine- and provider-visible state; no transactional guard is
    /// placed around it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnimplementedProviderAction`] without side
    /// effects if the provider has no implementation for `name`, or
    /// whatever the action implementation fails with.
    pub fn action(
        self: &Arc<Self>,
        name: &str,
        extra_options: Option<Value>,
    ) -> Result<ActionContext> {
        let callable = self.require_provider()?.action(name).ok_or_else(|| {
            CoreError::UnimplementedProviderAction {
                action: name.to_string(),
                provider: self.provider_name.clone(),
            }
        })?;

        tracing::debug!(machine = %self.name, action = %name, "running action");

        let mut context = ActionContext::new(Arc::clone(self), self.ui(), name);
        context.merge_options(extra_options);
        callable(&mut context)?;
        Ok(context)
    }

    /// Resolves final connection parameters for this machine.
    ///
    /// Returns `None` when the provider reports the machine cannot be
    /// reached. Otherwise merges the provider's report with the
    /// document's connection configuration: explicit values override the
    /// provider, the default tier fills remaining gaps, and credential
    /// paths follow the data-directory-override and
    /// password-implies-no-default-key rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be queried.
    pub fn connection_info(&self) -> Result<Option<ConnectionInfo>> {
        let Some(raw) = self.require_provider()?.connection_info()? else {
            return Ok(None);
        };

        let resolver = ConnectionInfoResolver::new(
            &self.config.ssh,
            self.env.root_path(),
            self.env.default_private_key_path(),
            self.data.private_key_override(),
        );
        Ok(Some(resolver.resolve(raw)))
    }

    /// The communication channel used to reach this machine's operating
    /// system. Memoized for the machine's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommunicatorNotFound`] if the configured
    /// communicator key has no registered factory, or whatever the
    /// factory fails with.
    pub fn communicate(&self) -> Result<Arc<dyn Communicator>> {
        if let Some(communicator) = self.communicator.get() {
            return Ok(Arc::clone(communicator));
        }

        let key = self
            .config
            .communicator
            .as_deref()
            .unwrap_or(DEFAULT_COMMUNICATOR);
        let factory =
            self.env
                .registry()
                .communicator(key)
                .ok_or_else(|| CoreError::CommunicatorNotFound {
                    name: key.to_string(),
                })?;
        let built = factory(self)?;
        Ok(Arc::clone(self.communicator.get_or_init(|| built)))
    }

    /// Resolves this machine's guest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MachineGuestNotReady`] if the communication
    /// channel is not ready to accept commands, or
    /// [`CoreError::GuestNotDetected`] if no registered guest plugin
    /// accepts the machine.
    pub fn guest(self: &Arc<Self>) -> Result<Guest> {
        let communicator = self.communicate()?;
        if !communicator.ready() {
            return Err(CoreError::MachineGuestNotReady {
                machine: self.name.clone(),
            });
        }
        Guest::resolve(Arc::clone(self))
    }

    /// Queries the machine state from the provider.
    ///
    /// Never cached; each call re-queries the provider.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MachineStateInvalid`] if the provider returns
    /// a malformed state, or whatever the provider query fails with.
    pub fn state(&self) -> Result<MachineState> {
        let state = self.require_provider()?.state()?;
        if !state.is_valid() {
            return Err(CoreError::MachineStateInvalid {
                machine: self.name.clone(),
            });
        }
        tracing::trace!(machine = %self.name, state = %state.id(), "queried state");
        Ok(state)
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("provider_name", &self.provider_name)
            .field("data_dir", &self.data.dir())
            .finish_non_exhaustive()
    }
}

/// Restores the previous output sink when dropped.
struct UiRestore<'a> {
    slot: &'a RwLock<Arc<dyn Ui>>,
    previous: Option<Arc<dyn Ui>>,
}

impl Drop for UiRestore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut slot = self
                .slot
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *slot = previous;
        }
    }
}
