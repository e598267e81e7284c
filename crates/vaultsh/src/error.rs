//! Error types for vaultsh.
//!
//! Each stage of the pipeline has its own error enum so callers can tell a
//! bad secret record from a bad key, an unreachable host or a shell that
//! failed to start. Every variant carries the path or address it concerns.

use std::time::Duration;

use thiserror::Error;

/// The main error type for vaultsh operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The secret record is malformed or incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No usable authentication strategy could be built.
    #[error(transparent)]
    AuthConfig(#[from] AuthConfigError),

    /// Dialing or opening a session on the remote host failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal negotiation, shell start or the running session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The secret store could not be reached or answered with an error.
    #[error("failed to {op} path '{path}': {source}")]
    Store {
        /// The store operation (`read` or `list`).
        op: StoreOp,
        /// The secret path involved.
        path: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },
}

/// Result type alias for vaultsh operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a store failure with the operation and path that caused it.
    pub fn store(op: StoreOp, path: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            op,
            path: path.into(),
            source,
        }
    }

    /// Remote exit status carried by this error, if any.
    #[must_use]
    pub const fn remote_exit_status(&self) -> Option<u32> {
        match self {
            Self::Session(SessionError::RemoteExit { status }) => Some(*status),
            _ => None,
        }
    }
}

/// Secret store operation, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Reading a single record.
    Read,
    /// Listing children of a path.
    List,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::List => f.write_str("list"),
        }
    }
}

/// Malformed or incomplete secret records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The store returned no data for the path.
    #[error("no secret found at path '{path}'")]
    NoSecret {
        /// The secret path.
        path: String,
    },

    /// Neither the nested nor the flat record shape matched.
    #[error(
        "unsupported secret shape at path '{path}': expected a nested 'data' map or a flat record with a non-empty 'hostname'"
    )]
    UnsupportedShape {
        /// The secret path.
        path: String,
    },

    /// Neither a password nor a key is present.
    #[error(
        "missing credential: either 'password' or 'key' must be provided in secret at path '{path}'"
    )]
    MissingCredential {
        /// The secret path (or target address for direct targets).
        path: String,
    },

    /// A listing response had an unusable `keys` field.
    #[error("failed to parse keys from path '{path}': {reason}")]
    MalformedKeys {
        /// The listed path.
        path: String,
        /// What was wrong with the field.
        reason: String,
    },
}

/// Failures building authentication strategies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthConfigError {
    /// The key did not parse and no passphrase was given.
    #[error("failed to parse private key: {reason}")]
    ParseKey {
        /// Parser message.
        reason: String,
    },

    /// The key did not parse with the given passphrase.
    #[error("failed to parse private key with passphrase: {reason}")]
    ParseKeyWithPassphrase {
        /// Parser message.
        reason: String,
    },

    /// Neither a usable key nor a password was supplied.
    #[error("no authentication methods successfully configured (no valid key or password provided)")]
    NoMethods,
}

/// Failures reaching or authenticating against the remote host.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target address is not of the form `host:port`.
    #[error("invalid target address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// What is wrong with it.
        reason: String,
    },

    /// TCP connect or SSH handshake failed.
    #[error("failed to dial SSH server {address}: {source}")]
    Dial {
        /// The target address.
        address: String,
        /// The underlying SSH error.
        #[source]
        source: russh::Error,
    },

    /// The dial did not complete in time.
    #[error("timed out after {after:?} dialing SSH server {address}")]
    Timeout {
        /// The target address.
        address: String,
        /// The elapsed limit.
        after: Duration,
    },

    /// The host identity verifier rejected the server key.
    #[error("host key verification failed for {address}")]
    HostKeyRejected {
        /// The target address.
        address: String,
    },

    /// The server rejected every offered strategy.
    #[error("authentication failed for user '{user}' at {address}: all offered methods were rejected")]
    Authentication {
        /// The target address.
        address: String,
        /// The user name offered.
        user: String,
    },

    /// Opening the session channel failed.
    #[error("failed to create SSH session on {address}: {source}")]
    SessionOpen {
        /// The target address.
        address: String,
        /// The underlying SSH error.
        #[source]
        source: russh::Error,
    },
}

/// Failures after an authenticated connection exists.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote side refused or failed the PTY request.
    #[error("failed to request PTY: {reason}")]
    PtyRequest {
        /// Why the request failed.
        reason: String,
    },

    /// The remote shell could not be started.
    #[error("failed to start remote shell: {reason}")]
    ShellStart {
        /// Why the shell failed to start.
        reason: String,
    },

    /// Local stream I/O failed while the shell was running.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The transport went away without closing the channel.
    #[error("SSH session ended with unexpected error: {reason}")]
    Disconnected {
        /// What was observed.
        reason: String,
    },

    /// The caller cancelled the session.
    #[error("SSH session cancelled")]
    Cancelled,

    /// The session outlived its configured limit.
    #[error("SSH session timed out after {after:?}")]
    TimedOut {
        /// The elapsed limit.
        after: Duration,
    },

    /// The remote shell exited non-zero (only under the propagate policy).
    #[error("remote shell exited with status {status}")]
    RemoteExit {
        /// The remote exit status.
        status: u32,
    },
}

/// Secret store transport failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Nothing exists at the path.
    #[error("path not found")]
    NotFound,

    /// The response body was not the expected JSON.
    #[error("invalid response: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("error reading config file {path}: {source}")]
    Read {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the settings schema.
    #[error("error parsing config file {path}: {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value failed validation.
    #[error("configuration validation failed: {message}")]
    Invalid {
        /// Dotted context plus the failing rule.
        message: String,
    },

    /// No configuration directory could be determined.
    #[error("error getting user config directory: {message}")]
    NoConfigDir {
        /// What went wrong.
        message: String,
    },

    /// The requested environment does not exist.
    #[error("unknown environment '{name}'")]
    UnknownEnvironment {
        /// The requested name.
        name: String,
    },

    /// The secret store client could not be built from the settings.
    #[error("failed to create Vault client: {message}")]
    Client {
        /// What went wrong.
        message: String,
    },
}

impl SettingsError {
    /// Create a validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_names_op_and_path() {
        let err = Error::store(StoreOp::List, "secret/metadata/servers", StoreError::NotFound);
        let msg = err.to_string();
        assert!(msg.contains("failed to list path 'secret/metadata/servers'"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn config_error_messages() {
        let err = ConfigError::MissingCredential {
            path: "secret/data/a".into(),
        };
        assert!(err.to_string().contains("either 'password' or 'key' must be provided"));

        let err = ConfigError::UnsupportedShape {
            path: "secret/data/a".into(),
        };
        assert!(err.to_string().starts_with("unsupported secret shape"));
    }

    #[test]
    fn remote_exit_status_extraction() {
        let err = Error::from(SessionError::RemoteExit { status: 3 });
        assert_eq!(err.remote_exit_status(), Some(3));
        assert_eq!(Error::from(SessionError::Cancelled).remote_exit_status(), None);
    }

    #[test]
    fn auth_config_messages() {
        assert!(
            AuthConfigError::NoMethods
                .to_string()
                .starts_with("no authentication methods successfully configured")
        );
        let err = AuthConfigError::ParseKeyWithPassphrase {
            reason: "bad".into(),
        };
        assert!(err.to_string().starts_with("failed to parse private key with passphrase"));
    }
}
