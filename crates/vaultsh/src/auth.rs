//! Authentication strategy building.
//!
//! Turns raw credential material into the ordered list of strategies the
//! session engine offers to the server: the key first, then the password.

use std::sync::Arc;

use russh::keys::PrivateKey;

use crate::error::AuthConfigError;

/// A way of proving identity to the remote host.
#[derive(Clone)]
pub enum AuthStrategy {
    /// Public key authentication with a parsed private key.
    PublicKey(Arc<PrivateKey>),
    /// Password authentication.
    Password(String),
}

impl AuthStrategy {
    /// Short method name, as used in logs.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::PublicKey(_) => "publickey",
            Self::Password(_) => "password",
        }
    }

    /// Check if this is public key auth.
    #[must_use]
    pub const fn is_public_key(&self) -> bool {
        matches!(self, Self::PublicKey(_))
    }

    /// Check if this is password auth.
    #[must_use]
    pub const fn is_password(&self) -> bool {
        matches!(self, Self::Password(_))
    }
}

impl std::fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicKey(key) => f
                .debug_tuple("PublicKey")
                .field(&key.algorithm().as_str())
                .finish(),
            Self::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}

/// Build the ordered authentication strategies for a target.
///
/// Empty inputs count as absent. A key that does not parse as-is is retried
/// with the passphrase when one is given; a key that cannot be parsed at all
/// is an error even if a password is also available.
pub fn build_auth_strategies(
    key: Option<&[u8]>,
    passphrase: Option<&str>,
    password: Option<&str>,
) -> Result<Vec<AuthStrategy>, AuthConfigError> {
    let key = key.filter(|k| !k.is_empty());
    let passphrase = passphrase.filter(|p| !p.is_empty());
    let password = password.filter(|p| !p.is_empty());

    let mut strategies = Vec::with_capacity(2);

    if let Some(key) = key {
        let parsed = parse_private_key(key, passphrase)?;
        tracing::debug!(algorithm = %parsed.algorithm().as_str(), "parsed private key");
        strategies.push(AuthStrategy::PublicKey(Arc::new(parsed)));
    }

    if let Some(password) = password {
        strategies.push(AuthStrategy::Password(password.to_string()));
    }

    if strategies.is_empty() {
        return Err(AuthConfigError::NoMethods);
    }
    Ok(strategies)
}

fn parse_private_key(key: &[u8], passphrase: Option<&str>) -> Result<PrivateKey, AuthConfigError> {
    let text = std::str::from_utf8(key).map_err(|e| AuthConfigError::ParseKey {
        reason: format!("key is not valid UTF-8: {e}"),
    })?;

    match russh::keys::decode_secret_key(text, None) {
        Ok(parsed) => Ok(parsed),
        Err(plain_err) => match passphrase {
            Some(passphrase) => russh::keys::decode_secret_key(text, Some(passphrase)).map_err(
                |e| AuthConfigError::ParseKeyWithPassphrase {
                    reason: e.to_string(),
                },
            ),
            None => Err(AuthConfigError::ParseKey {
                reason: plain_err.to_string(),
            }),
        },
    }
}
