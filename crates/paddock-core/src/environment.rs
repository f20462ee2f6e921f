//! Environment and manifest back-references.
//!
//! Machines never own these; they look values up through them (plugin
//! registry, root path, default credential path, base output sink).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::registry::PluginRegistry;
use crate::ui::{SilentUi, Ui};

/// Opaque descriptor of the base image a machine boots from.
///
/// The core carries this through to providers unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseImage {
    /// Image name.
    pub name: String,
    /// Optional pinned version.
    pub version: Option<String>,
}

impl BaseImage {
    /// Creates a descriptor for a named image.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Pins the image to a version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// The environment a set of machines runs in.
///
/// Provides the root path (credential paths are expanded against it),
/// the environment-wide default credential path, the plugin registry,
/// and the base output sink new machines inherit.
pub struct Environment {
    root_path: PathBuf,
    default_private_key_path: PathBuf,
    registry: Arc<PluginRegistry>,
    ui: Arc<dyn Ui>,
}

impl Environment {
    /// Creates an environment rooted at `root_path`.
    ///
    /// The default credential path is seeded under the root; override it
    /// with [`with_default_private_key_path`](Self::with_default_private_key_path).
    pub fn new(root_path: impl Into<PathBuf>, registry: Arc<PluginRegistry>) -> Self {
        let root_path = root_path.into();
        let default_private_key_path = root_path.join(".paddock").join("insecure_private_key");
        Self {
            root_path,
            default_private_key_path,
            registry,
            ui: Arc::new(SilentUi),
        }
    }

    /// Overrides the environment-wide default credential path.
    #[must_use]
    pub fn with_default_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_private_key_path = path.into();
        self
    }

    /// Sets the base output sink new machines inherit.
    #[must_use]
    pub fn with_ui(mut self, ui: Arc<dyn Ui>) -> Self {
        self.ui = ui;
        self
    }

    /// Root directory of the environment.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Environment-wide default credential path.
    #[must_use]
    pub fn default_private_key_path(&self) -> &Path {
        &self.default_private_key_path
    }

    /// The plugin registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The base output sink.
    #[must_use]
    pub fn ui(&self) -> Arc<dyn Ui> {
        Arc::clone(&self.ui)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("root_path", &self.root_path)
            .field("default_private_key_path", &self.default_private_key_path)
            .finish_non_exhaustive()
    }
}

/// The loaded configuration document plus its source location.
#[derive(Debug, Clone)]
pub struct Manifest {
    config: Arc<ProjectConfig>,
    path: Option<PathBuf>,
}

impl Manifest {
    /// Wraps an already-built configuration document.
    #[must_use]
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config: Arc::new(config),
            path: None,
        }
    }

    /// Parses a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(Self::new(ProjectConfig::from_toml_str(raw)?))
    }

    /// Loads a manifest from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path)?;
        let mut manifest = Self::from_toml_str(&raw)?;
        manifest.path = Some(path);
        Ok(manifest)
    }

    /// The configuration document.
    #[must_use]
    pub fn config(&self) -> &Arc<ProjectConfig> {
        &self.config
    }

    /// Where the manifest was loaded from, if it came from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
