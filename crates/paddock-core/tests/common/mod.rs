//! Shared test fixtures: stub provider, guest, communicator, and UI.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tempfile::TempDir;

use paddock_core::{
    ActionContext, Communicator, Environment, GuestCapability, GuestPlugin, Machine,
    MachineDefinition, MachineState, Manifest, PluginRegistry, ProjectConfig, Provider,
    ProviderAction, ProviderConnectionInfo, Result, Ui,
};

// ============================================================================
// Stub provider
// ============================================================================

/// Shared, test-visible state behind a stub provider.
#[derive(Default)]
pub struct StubProviderState {
    actions: Mutex<HashMap<String, ProviderAction>>,
    state: Mutex<Option<MachineState>>,
    connection: Mutex<Option<ProviderConnectionInfo>>,
    /// Number of `machine_id_changed` notifications received.
    pub id_changed: AtomicUsize,
}

impl StubProviderState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs a callable for the named action.
    pub fn set_action(
        &self,
        name: &str,
        callable: impl Fn(&mut ActionContext) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(callable));
    }

    /// Sets the state the provider reports.
    pub fn set_state(&self, state: MachineState) {
        *self.state.lock().unwrap() = Some(state);
    }

    /// Sets the raw connection info the provider reports.
    pub fn set_connection(&self, info: Option<ProviderConnectionInfo>) {
        *self.connection.lock().unwrap() = info;
    }
}

pub struct StubProvider(pub Arc<StubProviderState>);

impl Provider for StubProvider {
    fn action(&self, name: &str) -> Option<ProviderAction> {
        self.0.actions.lock().unwrap().get(name).cloned()
    }

    fn state(&self) -> Result<MachineState> {
        self.0
            .state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| paddock_core::CoreError::Provider("no state configured".to_string()))
    }

    fn connection_info(&self) -> Result<Option<ProviderConnectionInfo>> {
        Ok(self.0.connection.lock().unwrap().clone())
    }

    fn machine_id_changed(&self) {
        self.0.id_changed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Stub communicator
// ============================================================================

pub struct StubCommunicator {
    pub ready: AtomicBool,
    pub executed: Mutex<Vec<String>>,
}

impl StubCommunicator {
    pub fn new(ready: bool) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(ready),
            executed: Mutex::new(Vec::new()),
        })
    }
}

impl Communicator for StubCommunicator {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn execute(&self, command: &str) -> Result<i32> {
        self.executed.lock().unwrap().push(command.to_string());
        Ok(0)
    }
}

// ============================================================================
// Stub guest
// ============================================================================

/// Guest plugin with a fixed detection answer and canned capabilities.
pub struct StubGuest {
    accepts: bool,
    capabilities: HashMap<String, Value>,
}

impl StubGuest {
    pub fn new(accepts: bool) -> Self {
        Self {
            accepts,
            capabilities: HashMap::new(),
        }
    }

    pub fn with_capability(mut self, name: &str, value: Value) -> Self {
        self.capabilities.insert(name.to_string(), value);
        self
    }
}

impl GuestPlugin for StubGuest {
    fn detect(&self, _machine: &Machine) -> bool {
        self.accepts
    }

    fn capability(&self, name: &str) -> Option<GuestCapability> {
        let value = self.capabilities.get(name).cloned()?;
        Some(Arc::new(move |_machine, _args| Ok(value.clone())))
    }
}

// ============================================================================
// Recording UI
// ============================================================================

#[derive(Default)]
pub struct RecordingUi {
    pub lines: Mutex<Vec<String>>,
}

impl Ui for RecordingUi {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("info: {message}"));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("warn: {message}"));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("error: {message}"));
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub const STUB_PROVIDER: &str = "stub";

/// A ready-to-use environment with one stub provider ("stub"), one stub
/// communicator registered as "ssh", and a temporary root directory.
pub struct Fixture {
    pub root: TempDir,
    pub registry: Arc<PluginRegistry>,
    pub env: Arc<Environment>,
    pub manifest: Arc<Manifest>,
    pub provider: Arc<StubProviderState>,
    pub communicator: Arc<StubCommunicator>,
    /// Number of communicator factory invocations.
    pub communicator_builds: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ProjectConfig::default())
    }

    pub fn with_config(config: ProjectConfig) -> Self {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(PluginRegistry::new());
        let provider = StubProviderState::new();
        let communicator = StubCommunicator::new(true);
        let communicator_builds = Arc::new(AtomicUsize::new(0));

        let provider_state = Arc::clone(&provider);
        registry
            .register_provider(
                STUB_PROVIDER,
                Arc::new(move |_machine: &Machine| {
                    Ok(Box::new(StubProvider(Arc::clone(&provider_state))) as Box<dyn Provider>)
                }),
            )
            .unwrap();

        let channel = Arc::clone(&communicator);
        let builds = Arc::clone(&communicator_builds);
        registry
            .register_communicator(
                "ssh",
                Arc::new(move |_machine: &Machine| {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::clone(&channel) as Arc<dyn Communicator>)
                }),
            )
            .unwrap();

        let env = Arc::new(Environment::new(root.path(), Arc::clone(&registry)));
        let manifest = Arc::new(Manifest::new(config));

        Self {
            root,
            registry,
            env,
            manifest,
            provider,
            communicator,
            communicator_builds,
        }
    }

    pub fn definition(&self, name: &str) -> MachineDefinition {
        MachineDefinition {
            name: name.to_string(),
            provider_name: STUB_PROVIDER.to_string(),
            provider_config: Value::Null,
            provider_options: Value::Null,
            base_image: None,
            data_dir: self.root.path().join("machines").join(name),
        }
    }

    pub fn machine(&self, name: &str) -> Arc<Machine> {
        Machine::new(
            self.definition(name),
            Arc::clone(&self.env),
            Arc::clone(&self.manifest),
        )
        .unwrap()
    }

    /// A machine whose provider options set its batch grouping signature.
    pub fn machine_with_options(&self, name: &str, options: Value) -> Arc<Machine> {
        let mut definition = self.definition(name);
        definition.provider_options = options;
        Machine::new(
            definition,
            Arc::clone(&self.env),
            Arc::clone(&self.manifest),
        )
        .unwrap()
    }
}
