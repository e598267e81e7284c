//! Connection targets.

use crate::auth::{AuthStrategy, build_auth_strategies};
use crate::error::{AuthConfigError, ConfigError};
use crate::secret::CredentialRecord;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Everything needed to reach and log into one host.
///
/// Built from a [`CredentialRecord`] or directly. Always carries a password
/// or a key.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    address: String,
    user: String,
    password: Option<String>,
    key: Option<Vec<u8>>,
    key_passphrase: Option<String>,
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ConnectionTarget {
    /// Create a target from explicit parts. Empty strings count as absent.
    pub fn new(
        address: impl Into<String>,
        user: impl Into<String>,
        password: Option<String>,
        key: Option<Vec<u8>>,
        key_passphrase: Option<String>,
    ) -> Result<Self, ConfigError> {
        let address = address.into();
        let password = password.filter(|p| !p.is_empty());
        let key = key.filter(|k| !k.is_empty());
        if password.is_none() && key.is_none() {
            return Err(ConfigError::MissingCredential { path: address });
        }

        Ok(Self {
            address,
            user: user.into(),
            password,
            key,
            key_passphrase: key_passphrase.filter(|p| !p.is_empty()),
        })
    }

    /// `host:port` to dial.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Remote user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether a password is set.
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Whether a private key is set.
    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Build the ordered authentication strategies for this target.
    pub fn auth_strategies(&self) -> Result<Vec<AuthStrategy>, AuthConfigError> {
        build_auth_strategies(
            self.key.as_deref(),
            self.key_passphrase.as_deref(),
            self.password.as_deref(),
        )
    }
}

impl TryFrom<CredentialRecord> for ConnectionTarget {
    type Error = ConfigError;

    /// Dial `ip` when set, otherwise `hostname`; the port defaults to 22.
    fn try_from(record: CredentialRecord) -> Result<Self, Self::Error> {
        let host = if record.ip.is_empty() {
            record.hostname
        } else {
            record.ip
        };
        let port = if record.port.is_empty() {
            DEFAULT_SSH_PORT.to_string()
        } else {
            record.port
        };

        Self::new(
            join_host_port(&host, &port),
            record.username,
            Some(record.password),
            Some(record.key.into_bytes()),
            Some(record.key_passphrase),
        )
    }
}

/// Join a host and port, bracketing bare IPv6 addresses.
#[must_use]
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Split a `host:port` address. Brackets around IPv6 hosts are removed.
///
/// An IPv6 host must be bracketed: `::1` and `fd00::5` carry no port.
#[must_use]
pub fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(bracketed) => bracketed,
        None if host.contains(':') => return None,
        None => host,
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}
