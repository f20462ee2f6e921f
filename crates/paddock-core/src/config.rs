//! Project configuration document.
//!
//! Only the parts the core consults are modeled here: the communicator
//! selection and the connection settings with their explicit and default
//! tiers. Everything else in a project file is provider- or
//! plugin-specific and travels through the core as opaque values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Read-only root configuration document for an environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Communicator key used to reach guests. Defaults to `"ssh"`.
    pub communicator: Option<String>,
    /// Connection settings.
    pub ssh: SshConfig,
}

impl ProjectConfig {
    /// Parses a configuration document from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or does not
    /// match the expected shape.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CoreError::Config(format!("failed to parse config: {e}")))
    }
}

/// Connection settings with explicit overrides and a default tier.
///
/// An explicit value here overrides whatever the provider reports; the
/// [`default`](SshConfig::default) tier applies only when neither an
/// explicit value nor a provider value is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Explicit host override.
    pub host: Option<String>,
    /// Explicit port override.
    pub port: Option<u16>,
    /// Explicit username override.
    pub username: Option<String>,
    /// Explicit password. An empty string counts as a set password.
    pub password: Option<String>,
    /// Explicit credential path or ordered list of paths.
    pub private_key_path: Option<KeyPaths>,
    /// Explicit agent-forwarding override.
    pub forward_agent: Option<bool>,
    /// Explicit X11-forwarding override.
    pub forward_x11: Option<bool>,
    /// Fallback tier, consulted last.
    pub default: SshDefaults,
}

/// Fallback connection values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshDefaults {
    /// Fallback host.
    pub host: Option<String>,
    /// Fallback port.
    pub port: Option<u16>,
    /// Fallback username.
    pub username: Option<String>,
    /// Fallback credential path or ordered list of paths.
    pub private_key_path: Option<KeyPaths>,
    /// Fallback agent-forwarding setting.
    pub forward_agent: Option<bool>,
    /// Fallback X11-forwarding setting.
    pub forward_x11: Option<bool>,
}

/// One credential path or an already-ordered list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPaths {
    /// A single path.
    Single(PathBuf),
    /// An ordered list of paths.
    List(Vec<PathBuf>),
}

impl KeyPaths {
    /// Normalizes to an ordered list.
    #[must_use]
    pub fn into_vec(self) -> Vec<PathBuf> {
        match self {
            Self::Single(path) => vec![path],
            Self::List(paths) => paths,
        }
    }
}

impl From<&str> for KeyPaths {
    fn from(path: &str) -> Self {
        Self::Single(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for KeyPaths {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::List(paths)
    }
}
