//! Connection-info resolution.
//!
//! The provider reports raw connection data; the resolver merges it with
//! the document's explicit connection configuration and its default tier
//! into final connection parameters. Credential paths have their own
//! rules because of the data-directory override and the
//! password-implies-no-default-key behavior.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{KeyPaths, SshConfig};

/// Raw connection data reported by a provider.
///
/// Every field is optional; resolution fills the gaps from the
/// configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConnectionInfo {
    /// Reachable address.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Login user.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Credential path or ordered list of paths.
    pub private_key_path: Option<KeyPaths>,
    /// Agent forwarding.
    pub forward_agent: Option<bool>,
    /// X11 forwarding.
    pub forward_x11: Option<bool>,
}

/// Final connection parameters for a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Reachable address, if any source supplied one.
    pub host: Option<String>,
    /// Port, if any source supplied one.
    pub port: Option<u16>,
    /// Login user, if any source supplied one.
    pub username: Option<String>,
    /// Password, if configured or provider-reported.
    pub password: Option<String>,
    /// Ordered credential paths. Empty when password authentication is
    /// assumed.
    pub private_key_paths: Vec<PathBuf>,
    /// Agent forwarding.
    pub forward_agent: bool,
    /// X11 forwarding.
    pub forward_x11: bool,
}

/// Merges provider, explicit, and default connection configuration.
///
/// Precedence for every field except the credential path list, highest
/// first: explicit configuration, provider value, configuration default.
pub struct ConnectionInfoResolver<'a> {
    ssh: &'a SshConfig,
    root_path: &'a Path,
    default_private_key_path: &'a Path,
    private_key_override: Option<PathBuf>,
}

impl<'a> ConnectionInfoResolver<'a> {
    /// Creates a resolver.
    ///
    /// `private_key_override` is the credential file under the machine's
    /// data directory, when present; it wins over every other source.
    #[must_use]
    pub fn new(
        ssh: &'a SshConfig,
        root_path: &'a Path,
        default_private_key_path: &'a Path,
        private_key_override: Option<PathBuf>,
    ) -> Self {
        Self {
            ssh,
            root_path,
            default_private_key_path,
            private_key_override,
        }
    }

    /// Resolves final connection parameters from the provider's report.
    #[must_use]
    pub fn resolve(&self, provider: ProviderConnectionInfo) -> ConnectionInfo {
        let host = self
            .ssh
            .host
            .clone()
            .or(provider.host)
            .or_else(|| self.ssh.default.host.clone());
        let port = self.ssh.port.or(provider.port).or(self.ssh.default.port);
        let username = self
            .ssh
            .username
            .clone()
            .or(provider.username)
            .or_else(|| self.ssh.default.username.clone());
        let password = self.ssh.password.clone().or(provider.password);
        let forward_agent = self
            .ssh
            .forward_agent
            .or(provider.forward_agent)
            .or(self.ssh.default.forward_agent)
            .unwrap_or(false);
        let forward_x11 = self
            .ssh
            .forward_x11
            .or(provider.forward_x11)
            .or(self.ssh.default.forward_x11)
            .unwrap_or(false);
        let private_key_paths = self.resolve_key_paths(provider.private_key_path);

        ConnectionInfo {
            host,
            port,
            username,
            password,
            private_key_paths,
            forward_agent,
            forward_x11,
        }
    }

    fn resolve_key_paths(&self, provider_paths: Option<KeyPaths>) -> Vec<PathBuf> {
        // The key in the data directory wins unconditionally, even over
        // an explicit password.
        if let Some(path) = &self.private_key_override {
            return vec![path.clone()];
        }

        let configured = self
            .ssh
            .private_key_path
            .clone()
            .or(provider_paths)
            .or_else(|| self.ssh.default.private_key_path.clone());
        if let Some(paths) = configured {
            return paths
                .into_vec()
                .into_iter()
                .map(|path| expand_path(&path, self.root_path))
                .collect();
        }

        // An explicitly configured password, even an empty one, means
        // password authentication: no default key is injected.
        if self.ssh.password.is_some() {
            return Vec::new();
        }

        vec![self.default_private_key_path.to_path_buf()]
    }
}

/// Expands `~/` against the home directory, then resolves relative paths
/// against the environment root.
fn expand_path(path: &Path, root: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SshDefaults;

    fn resolver_parts() -> (SshConfig, PathBuf, PathBuf) {
        (
            SshConfig::default(),
            PathBuf::from("/project"),
            PathBuf::from("/project/.paddock/insecure_private_key"),
        )
    }

    fn resolve(
        ssh: &SshConfig,
        root: &Path,
        default_key: &Path,
        key_override: Option<PathBuf>,
        provider: ProviderConnectionInfo,
    ) -> ConnectionInfo {
        ConnectionInfoResolver::new(ssh, root, default_key, key_override).resolve(provider)
    }

    #[test]
    fn provider_value_used_without_explicit_config() {
        let (ssh, root, key) = resolver_parts();
        let info = resolve(
            &ssh,
            &root,
            &key,
            None,
            ProviderConnectionInfo {
                host: Some("10.0.0.5".to_string()),
                port: Some(22),
                username: Some("core".to_string()),
                ..ProviderConnectionInfo::default()
            },
        );
        assert_eq!(info.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(info.port, Some(22));
        assert_eq!(info.username.as_deref(), Some("core"));
    }

    #[test]
    fn explicit_config_wins_over_provider_and_default() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.host = Some("configured".to_string());
        ssh.default = SshDefaults {
            host: Some("fallback".to_string()),
            ..SshDefaults::default()
        };
        let info = resolve(
            &ssh,
            &root,
            &key,
            None,
            ProviderConnectionInfo {
                host: Some("provider".to_string()),
                ..ProviderConnectionInfo::default()
            },
        );
        assert_eq!(info.host.as_deref(), Some("configured"));
    }

    #[test]
    fn default_tier_used_only_when_nothing_else_present() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.default = SshDefaults {
            username: Some("fallback".to_string()),
            port: Some(2200),
            ..SshDefaults::default()
        };
        let info = resolve(&ssh, &root, &key, None, ProviderConnectionInfo::default());
        assert_eq!(info.username.as_deref(), Some("fallback"));
        assert_eq!(info.port, Some(2200));
    }

    #[test]
    fn booleans_follow_three_tier_precedence() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.forward_agent = Some(false);
        ssh.default.forward_x11 = Some(true);
        let info = resolve(
            &ssh,
            &root,
            &key,
            None,
            ProviderConnectionInfo {
                forward_agent: Some(true),
                ..ProviderConnectionInfo::default()
            },
        );
        assert!(!info.forward_agent);
        assert!(info.forward_x11);
    }

    #[test]
    fn provider_key_path_becomes_single_element_list() {
        let (ssh, root, key) = resolver_parts();
        let info = resolve(
            &ssh,
            &root,
            &key,
            None,
            ProviderConnectionInfo {
                private_key_path: Some(KeyPaths::from("/keys/provider")),
                ..ProviderConnectionInfo::default()
            },
        );
        assert_eq!(info.private_key_paths, vec![PathBuf::from("/keys/provider")]);
    }

    #[test]
    fn explicit_key_list_keeps_input_order() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.private_key_path = Some(KeyPaths::from(vec![
            PathBuf::from("/keys/a"),
            PathBuf::from("/keys/b"),
        ]));
        let info = resolve(&ssh, &root, &key, None, ProviderConnectionInfo::default());
        assert_eq!(
            info.private_key_paths,
            vec![PathBuf::from("/keys/a"), PathBuf::from("/keys/b")]
        );
    }

    #[test]
    fn relative_key_paths_expand_against_root() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.private_key_path = Some(KeyPaths::from("keys/dev"));
        let info = resolve(&ssh, &root, &key, None, ProviderConnectionInfo::default());
        assert_eq!(info.private_key_paths, vec![PathBuf::from("/project/keys/dev")]);
    }

    #[test]
    fn no_keys_and_no_password_falls_back_to_environment_default() {
        let (ssh, root, key) = resolver_parts();
        let info = resolve(&ssh, &root, &key, None, ProviderConnectionInfo::default());
        assert_eq!(info.private_key_paths, vec![key]);
    }

    #[test]
    fn empty_string_password_suppresses_default_key() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.password = Some(String::new());
        let info = resolve(&ssh, &root, &key, None, ProviderConnectionInfo::default());
        assert!(info.private_key_paths.is_empty());
        assert_eq!(info.password.as_deref(), Some(""));
    }

    #[test]
    fn data_dir_key_overrides_every_other_source() {
        let (mut ssh, root, key) = resolver_parts();
        ssh.password = Some(String::new());
        ssh.private_key_path = Some(KeyPaths::from("/keys/explicit"));
        let info = resolve(
            &ssh,
            &root,
            &key,
            Some(PathBuf::from("/data/machine/private_key")),
            ProviderConnectionInfo {
                private_key_path: Some(KeyPaths::from("/keys/provider")),
                ..ProviderConnectionInfo::default()
            },
        );
        assert_eq!(
            info.private_key_paths,
            vec![PathBuf::from("/data/machine/private_key")]
        );
        assert_eq!(info.password.as_deref(), Some(""));
    }
}
