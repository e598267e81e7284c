//! vaultsh: interactive SSH sessions with credentials from HashiCorp Vault
//!
//! This crate resolves a credential record from a Vault KV mount, turns it
//! into authentication strategies and drives an interactive remote shell.
//!
//! # Features
//!
//! - **Shape-agnostic records**: versioned (nested `data`) and flat KV payloads
//! - **Key then password** authentication with passphrase fallback
//! - **Host key verification** against `known_hosts` with trust on first use
//! - **Scoped raw mode**: the local terminal is always restored
//! - **Cancellation and timeouts** around the running session
//!
//! # Example
//!
//! ```ignore
//! use vaultsh::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> vaultsh::Result<()> {
//!     let vault = VaultClient::new("https://vault.example.com:8200", "s.token")?;
//!     let resolver = SecretResolver::new(vault);
//!
//!     let path = SecretPath::record("servers", "prod", "web01");
//!     let record = resolver.read(&path.data_path()).await?;
//!     let target = ConnectionTarget::try_from(record)?;
//!
//!     open_shell(&target, SessionOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod hostkey;
pub mod prelude;
pub mod secret;
pub mod session;
pub mod target;
pub mod terminal;

pub use auth::{AuthStrategy, build_auth_strategies};
pub use config::{ConfigLoader, EnvConfig, EnvironmentSettings, Settings, SshSettings};
pub use error::{
    AuthConfigError, ConfigError, Error, Result, SessionError, SettingsError, StoreError, StoreOp,
    TransportError,
};
#[cfg(feature = "insecure-skip-verify")]
pub use hostkey::AcceptAnyHostKey;
pub use hostkey::{HostKeyPolicy, HostKeyVerifier, KnownHosts};
pub use secret::{CredentialRecord, SecretPath, SecretResolver, SecretStore, VaultClient};
pub use session::{
    CancelSignal, Canceller, ExitStatusPolicy, LocalStreams, PtyRequest, SessionEngine,
    SessionOptions, SessionOutcome, SessionState, cancellation, open_shell,
};
pub use target::ConnectionTarget;
pub use terminal::{LocalTerminal, ProcessTerminal, RawModeGuard, TerminalSize};
