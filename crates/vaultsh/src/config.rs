//! Configuration for vaultsh.
//!
//! Settings come from a TOML file holding a `[default]` Vault environment,
//! any number of named `[environments.<name>]` and an `[ssh]` section.
//!
//! ```toml
//! [default]
//! address = "https://vault.example.com:8200"
//! token = "s.xxxx"
//! timeout = 5
//!
//! [default.tls]
//! verify = true
//! ca_cert = "/etc/ssl/vault-ca.pem"
//!
//! [default.retry]
//! max_attempts = 3
//! initial_interval = 1
//! max_interval = 5
//!
//! [ssh]
//! strict_host_keys = false
//! exit_status = "suppress"
//! ```

pub mod env;
pub mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub use env::EnvConfig;
pub use file::{APP_DIR, CONFIG_FILE_NAME, ConfigLoader};

use crate::error::SettingsError;
use crate::hostkey::{HostKeyPolicy, KnownHosts};
use crate::secret::{DEFAULT_MOUNT, RetryStrategy};
use crate::session::{DEFAULT_CONNECT_TIMEOUT, ExitStatusPolicy, SessionOptions};

/// Name that selects the `[default]` environment.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Environment used when none is named.
    pub default: EnvironmentSettings,
    /// Named environments.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSettings>,
    /// SSH client settings.
    #[serde(default)]
    pub ssh: SshSettings,
}

/// One Vault deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentSettings {
    /// Server URL, `http://` or `https://`.
    pub address: String,
    /// Access token.
    pub token: String,
    /// KV mount holding the records.
    pub mount: String,
    /// TLS settings.
    pub tls: TlsSettings,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Retry settings.
    pub retry: RetrySettings,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            token: String::new(),
            mount: DEFAULT_MOUNT.to_string(),
            tls: TlsSettings::default(),
            timeout: DEFAULT_TIMEOUT_SECS,
            retry: RetrySettings::default(),
        }
    }
}

/// TLS settings for the Vault connection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSettings {
    /// Verify the server against `ca_cert`. When off, any certificate is accepted.
    pub verify: bool,
    /// CA bundle (PEM).
    pub ca_cert: Option<PathBuf>,
    /// Client certificate (PEM).
    pub client_cert: Option<PathBuf>,
    /// Client private key (PEM).
    pub client_key: Option<PathBuf>,
}

/// Retry settings, intervals in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: u64,
    /// Longest delay between retries.
    pub max_interval: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: 1,
            max_interval: 5,
        }
    }
}

/// SSH client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    /// `known_hosts` file. Defaults to `$SSH_KNOWN_HOSTS` or `~/.ssh/known_hosts`.
    pub known_hosts: Option<PathBuf>,
    /// Reject hosts without a `known_hosts` entry instead of recording them.
    pub strict_host_keys: bool,
    /// Non-zero remote exit status handling.
    pub exit_status: ExitStatusPolicy,
    /// Dial timeout in seconds.
    pub connect_timeout: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            known_hosts: None,
            strict_host_keys: false,
            exit_status: ExitStatusPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl TlsSettings {
    fn validate(&self) -> Result<(), String> {
        if self.verify && self.ca_cert.is_none() {
            return Err("TLS verification is enabled but no CA certificate is provided".into());
        }
        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => Err("client certificate is provided but no client key".into()),
            (None, Some(_)) => Err("client key is provided but no client certificate".into()),
            _ => Ok(()),
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts < 1 {
            return Err("max_attempts must be greater than 0".into());
        }
        if self.initial_interval < 1 {
            return Err("initial_interval must be greater than 0".into());
        }
        if self.max_interval < self.initial_interval {
            return Err("max_interval must be greater than or equal to initial_interval".into());
        }
        Ok(())
    }

    /// The backoff these settings describe.
    #[must_use]
    pub const fn strategy(&self) -> RetryStrategy {
        RetryStrategy::exponential(
            Duration::from_secs(self.initial_interval),
            Duration::from_secs(self.max_interval),
            self.max_attempts,
        )
    }
}

impl EnvironmentSettings {
    /// Check every rule, returning the first failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.address.is_empty() {
            return Err("address is required".into());
        }
        if self.token.is_empty() {
            return Err("token is required".into());
        }
        self.validate_stored()
    }

    /// Check the rules `VAULT_ADDR` and `VAULT_TOKEN` cannot satisfy later.
    ///
    /// An empty address or token passes here.
    fn validate_stored(&self) -> Result<(), String> {
        if !self.address.is_empty()
            && !self.address.starts_with("http://")
            && !self.address.starts_with("https://")
        {
            return Err("address must start with http:// or https://".into());
        }
        if self.timeout < 1 {
            return Err("timeout must be greater than 0".into());
        }
        if self.mount.trim_matches('/').is_empty() {
            return Err("mount must not be empty".into());
        }
        self.tls
            .validate()
            .map_err(|e| format!("TLS validation failed: {e}"))?;
        self.retry
            .validate()
            .map_err(|e| format!("retry validation failed: {e}"))?;
        Ok(())
    }

    /// Replace address and token with `VAULT_ADDR` / `VAULT_TOKEN` when set.
    pub fn apply_env(&mut self, vault_env: &EnvConfig) {
        if let Some(address) = vault_env.get(env::vars::ADDR) {
            tracing::debug!(address = %address, "address overridden from environment");
            self.address = address;
        }
        if let Some(token) = vault_env.get(env::vars::TOKEN) {
            tracing::debug!("token overridden from environment");
            self.token = token;
        }
    }
}

impl Settings {
    /// Parse TOML text without validating.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Validate what the file alone must get right.
    ///
    /// Address and token may be left out of any environment; [`Settings::resolve`]
    /// requires them once the `VAULT_*` overrides are applied.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.default
            .validate_stored()
            .map_err(|e| invalid_environment(None, &e))?;
        for (name, environment) in &self.environments {
            environment
                .validate_stored()
                .map_err(|e| invalid_environment(Some(name.as_str()), &e))?;
        }
        if self.ssh.connect_timeout < 1 {
            return Err(SettingsError::invalid(
                "ssh validation failed: connect_timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Look an environment up by name. `None` and `"default"` select `[default]`.
    pub fn environment(&self, name: Option<&str>) -> Result<&EnvironmentSettings, SettingsError> {
        match name {
            None | Some(DEFAULT_ENVIRONMENT) => Ok(&self.default),
            Some(name) => self
                .environments
                .get(name)
                .ok_or_else(|| SettingsError::UnknownEnvironment {
                    name: name.to_string(),
                }),
        }
    }

    /// Select an environment, apply `VAULT_*` overrides and validate the result.
    pub fn resolve(
        &self,
        name: Option<&str>,
        vault_env: &EnvConfig,
    ) -> Result<EnvironmentSettings, SettingsError> {
        let mut environment = self.environment(name)?.clone();
        environment.apply_env(vault_env);
        environment
            .validate()
            .map_err(|e| invalid_environment(name, &e))?;
        Ok(environment)
    }
}

fn invalid_environment(name: Option<&str>, reason: &str) -> SettingsError {
    match name {
        None | Some(DEFAULT_ENVIRONMENT) => {
            SettingsError::invalid(format!("default configuration validation failed: {reason}"))
        }
        Some(name) => SettingsError::invalid(format!("environment '{name}' validation failed: {reason}")),
    }
}

impl SshSettings {
    /// The `known_hosts` verifier these settings describe.
    #[must_use]
    pub fn known_hosts(&self) -> KnownHosts {
        let hosts = self
            .known_hosts
            .as_deref()
            .map_or_else(KnownHosts::default, |path| KnownHosts::new(expand_home(path)));
        let policy = if self.strict_host_keys {
            HostKeyPolicy::Strict
        } else {
            HostKeyPolicy::TrustOnFirstUse
        };
        hosts.with_policy(policy)
    }

    /// Session options for these settings.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_verifier(std::sync::Arc::new(self.known_hosts()))
            .with_exit_status(self.exit_status)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
    }
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_home(path: &std::path::Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
