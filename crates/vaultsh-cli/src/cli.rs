//! Command-line interface definitions and command handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use vaultsh::config::expand_home;
use vaultsh::secret::Field;
use vaultsh::session::SessionOptions;
use vaultsh::target::{DEFAULT_SSH_PORT, join_host_port, split_host_port};
use vaultsh::{
    AuthConfigError, ConfigError, ConfigLoader, ConnectionTarget, EnvConfig, EnvironmentSettings,
    ExitStatusPolicy, LocalStreams, SecretPath, SecretResolver, SessionEngine, SettingsError,
    SshSettings, VaultClient, cancellation,
};

/// Keys tried, in order, when `direct` is given no credentials.
const DEFAULT_KEY_FILES: [&str; 2] = ["id_ed25519", "id_rsa"];

/// vaultsh: SSH with credentials from Vault
#[derive(Debug, Parser)]
#[command(
    name = "vaultsh",
    version,
    about,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (default: $VAULTSH_CONFIG, ./config/vaultsh.toml,
    /// then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Vault environment from the configuration file
    #[arg(long = "env", global = true, env = "VAULTSH_ENV", value_name = "NAME")]
    pub environment: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// known_hosts file for host key verification
    #[arg(long, global = true, value_name = "FILE")]
    pub known_hosts: Option<PathBuf>,

    /// Reject hosts that have no known_hosts entry
    #[arg(long, global = true)]
    pub strict_host_keys: bool,

    /// How a non-zero remote exit status is reported
    #[arg(long, global = true, value_name = "POLICY")]
    pub exit_status: Option<ExitStatusPolicy>,

    /// End the session after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use the path as given, without adding the mount and data/metadata
    #[arg(long, global = true)]
    pub raw_path: bool,

    /// Accept any host key without verification (lab use only)
    #[cfg(feature = "insecure-skip-verify")]
    #[arg(long, global = true)]
    pub insecure_accept_any_host_key: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List records and folders under a path
    List {
        /// Path below the mount, e.g. servers/prod
        #[arg(default_value = "")]
        path: String,
    },

    /// Print a credential record with secrets redacted
    Show {
        /// Record path below the mount, e.g. servers/prod/web01
        path: String,
    },

    /// Open an interactive shell using the record at a path
    Connect {
        /// Record path below the mount, e.g. servers/prod/web01
        path: String,
    },

    /// Open an interactive shell without Vault
    Direct {
        /// host or host:port (port defaults to 22)
        #[arg(long)]
        address: String,

        /// Remote user
        #[arg(long)]
        user: String,

        /// Private key file
        #[arg(long, value_name = "FILE")]
        key_file: Option<PathBuf>,

        /// Environment variable holding the key passphrase
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,

        /// Environment variable holding the password
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,
    },
}

/// Errors reported by the command-line client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Library failure.
    #[error(transparent)]
    Vaultsh(#[from] vaultsh::Error),

    /// Configuration file failure.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Incomplete target.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unusable credentials.
    #[error(transparent)]
    Auth(#[from] AuthConfigError),

    /// A key file could not be read.
    #[error("failed to read key file {}: {source}", path.display())]
    ReadKey {
        /// The key file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A variable named on the command line is unset.
    #[error("environment variable {name} is not set")]
    MissingEnv {
        /// The variable name.
        name: String,
    },
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// A propagated remote exit status is passed through; anything above
    /// 255 becomes 255.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.remote_exit_status()
            .map_or(1, |status| u8::try_from(status).unwrap_or(u8::MAX))
    }

    /// Remote exit status carried by this error, if any.
    #[must_use]
    pub const fn remote_exit_status(&self) -> Option<u32> {
        match self {
            Self::Vaultsh(e) => e.remote_exit_status(),
            _ => None,
        }
    }
}

/// Which side of the KV layout a path addresses.
#[derive(Debug, Clone, Copy)]
enum PathKind {
    Data,
    Metadata,
}

impl Cli {
    /// Run the selected command.
    pub async fn run(self) -> Result<(), CliError> {
        match &self.command {
            Command::List { path } => self.list(path).await,
            Command::Show { path } => self.show(path).await,
            Command::Connect { path } => self.connect(path).await,
            Command::Direct {
                address,
                user,
                key_file,
                passphrase_env,
                password_env,
            } => {
                let target = direct_target(
                    address,
                    user,
                    key_file.as_deref(),
                    passphrase_env.as_deref(),
                    password_env.as_deref(),
                )?;
                let ssh = self.optional_ssh_settings()?;
                self.open(&target, &ssh).await
            }
        }
    }

    async fn list(&self, path: &str) -> Result<(), CliError> {
        let (environment, _) = self.environment()?;
        let resolver = SecretResolver::new(VaultClient::from_settings(&environment)?);
        let full = self.store_path(&environment, path, PathKind::Metadata);

        for key in resolver.list(&full).await? {
            println!("{key}");
        }
        Ok(())
    }

    async fn show(&self, path: &str) -> Result<(), CliError> {
        let (environment, _) = self.environment()?;
        let resolver = SecretResolver::new(VaultClient::from_settings(&environment)?);
        let full = self.store_path(&environment, path, PathKind::Data);

        let record = resolver.read(&full).await?;
        for field in Field::ALL {
            let value = field.get(&record);
            if value.is_empty() {
                continue;
            }
            let shown = if field.is_secret() { "<redacted>" } else { value };
            println!("{}: {shown}", field.storage_key());
        }
        Ok(())
    }

    async fn connect(&self, path: &str) -> Result<(), CliError> {
        let (environment, ssh) = self.environment()?;
        let resolver = SecretResolver::new(VaultClient::from_settings(&environment)?);
        let full = self.store_path(&environment, path, PathKind::Data);

        let record = resolver.read(&full).await?;
        let target = ConnectionTarget::try_from(record)?;
        tracing::info!(path = %full, address = %target.address(), user = %target.user(), "resolved target");
        self.open(&target, &ssh).await
    }

    async fn open(&self, target: &ConnectionTarget, ssh: &SshSettings) -> Result<(), CliError> {
        let strategies = target.auth_strategies()?;
        let mut engine = SessionEngine::new(self.session_options(ssh));

        let (canceller, signal) = cancellation();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });

        let result = engine
            .run(
                target.address(),
                target.user(),
                &strategies,
                LocalStreams::process(),
                signal,
            )
            .await;
        interrupt.abort();

        let outcome = result?;
        tracing::debug!(status = ?outcome.status(), history = ?engine.history(), "session finished");
        Ok(())
    }

    /// Load the configuration and resolve the selected Vault environment.
    fn environment(&self) -> Result<(EnvironmentSettings, SshSettings), CliError> {
        let (path, settings) = ConfigLoader::new().with_path(self.config.clone()).load()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        let environment = settings.resolve(self.environment.as_deref(), &EnvConfig::vault())?;
        Ok((environment, settings.ssh))
    }

    /// SSH settings for `direct`, which works without a configuration file.
    fn optional_ssh_settings(&self) -> Result<SshSettings, CliError> {
        match ConfigLoader::new().with_path(self.config.clone()).load() {
            Ok((_, settings)) => Ok(settings.ssh),
            Err(SettingsError::Read { .. } | SettingsError::NoConfigDir { .. })
                if self.config.is_none() =>
            {
                tracing::debug!("no configuration file, using default SSH settings");
                Ok(SshSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store_path(&self, environment: &EnvironmentSettings, path: &str, kind: PathKind) -> String {
        if self.raw_path {
            return path.trim_matches('/').to_string();
        }
        let path = SecretPath::with_mount(&environment.mount, path);
        match kind {
            PathKind::Data => path.data_path(),
            PathKind::Metadata => path.metadata_path(),
        }
    }

    /// Session options from the file settings with command-line overrides.
    fn session_options(&self, ssh: &SshSettings) -> SessionOptions {
        let mut ssh = ssh.clone();
        if let Some(path) = &self.known_hosts {
            ssh.known_hosts = Some(path.clone());
        }
        if self.strict_host_keys {
            ssh.strict_host_keys = true;
        }
        if let Some(policy) = self.exit_status {
            ssh.exit_status = policy;
        }

        let options = ssh
            .session_options()
            .with_session_timeout(self.timeout.map(Duration::from_secs));
        self.with_insecure_verifier(options)
    }

    #[cfg(feature = "insecure-skip-verify")]
    fn with_insecure_verifier(&self, options: SessionOptions) -> SessionOptions {
        if self.insecure_accept_any_host_key {
            tracing::warn!("host key verification disabled");
            return options.with_verifier(std::sync::Arc::new(vaultsh::AcceptAnyHostKey::insecure()));
        }
        options
    }

    #[cfg(not(feature = "insecure-skip-verify"))]
    #[allow(clippy::unused_self)]
    fn with_insecure_verifier(&self, options: SessionOptions) -> SessionOptions {
        options
    }
}

/// Build a target from command-line parts.
fn direct_target(
    address: &str,
    user: &str,
    key_file: Option<&Path>,
    passphrase_env: Option<&str>,
    password_env: Option<&str>,
) -> Result<ConnectionTarget, CliError> {
    let address = if split_host_port(address).is_some() {
        address.to_string()
    } else {
        join_host_port(address, &DEFAULT_SSH_PORT.to_string())
    };

    let password = password_env.map(required_env).transpose()?;
    let passphrase = passphrase_env.map(required_env).transpose()?;

    let key = match key_file {
        Some(path) => Some(read_key(&expand_home(path))?),
        None if password.is_none() => default_key()?,
        None => None,
    };

    Ok(ConnectionTarget::new(address, user, password, key, passphrase)?)
}

fn required_env(name: &str) -> Result<String, CliError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CliError::MissingEnv {
            name: name.to_string(),
        })
}

fn read_key(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::ReadKey {
        path: path.to_path_buf(),
        source,
    })
}

/// The first of `~/.ssh/id_ed25519` and `~/.ssh/id_rsa` that exists.
fn default_key() -> Result<Option<Vec<u8>>, CliError> {
    let Some(ssh_dir) = dirs::home_dir().map(|home| home.join(".ssh")) else {
        return Ok(None);
    };
    for name in DEFAULT_KEY_FILES {
        let path = ssh_dir.join(name);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "using default key");
            return read_key(&path).map(Some);
        }
    }
    Ok(None)
}
