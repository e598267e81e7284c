//! Credential records and shape normalization.
//!
//! A record may be stored nested (fields under an inner `data` map, as the
//! versioned KV engine returns them) or flat (fields at the top level).
//! Both shapes normalize into the same [`CredentialRecord`].

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// A stored credential, normalized from either storage shape.
///
/// Every field is a plain string; an empty string means the field was absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    /// DNS name of the target.
    pub hostname: String,
    /// IP address of the target (preferred over `hostname` when dialing).
    pub ip: String,
    /// SSH port as stored (usually `"22"`).
    pub port: String,
    /// Remote user name.
    pub username: String,
    /// Password for password authentication.
    pub password: String,
    /// Raw private key (PEM / OpenSSH armor).
    pub key: String,
    /// Passphrase for an encrypted `key`.
    pub key_passphrase: String,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("hostname", &self.hostname)
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("key", &redacted(&self.key))
            .field("key_passphrase", &redacted(&self.key_passphrase))
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "<redacted>" }
}

/// The fields a credential record is made of.
///
/// Extraction walks this table instead of inspecting the record type at
/// runtime, so adding a field means adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `hostname`
    Hostname,
    /// `ip`
    Ip,
    /// `port`
    Port,
    /// `username`
    Username,
    /// `password`
    Password,
    /// `key`
    Key,
    /// `key_passphrase`
    KeyPassphrase,
}

impl Field {
    /// Every field, in storage order.
    pub const ALL: [Self; 7] = [
        Self::Hostname,
        Self::Ip,
        Self::Port,
        Self::Username,
        Self::Password,
        Self::Key,
        Self::KeyPassphrase,
    ];

    /// The key this field is stored under.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::Ip => "ip",
            Self::Port => "port",
            Self::Username => "username",
            Self::Password => "password",
            Self::Key => "key",
            Self::KeyPassphrase => "key_passphrase",
        }
    }

    /// Whether the value must never be printed.
    #[must_use]
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::Key | Self::KeyPassphrase)
    }

    fn slot(self, record: &mut CredentialRecord) -> &mut String {
        match self {
            Self::Hostname => &mut record.hostname,
            Self::Ip => &mut record.ip,
            Self::Port => &mut record.port,
            Self::Username => &mut record.username,
            Self::Password => &mut record.password,
            Self::Key => &mut record.key,
            Self::KeyPassphrase => &mut record.key_passphrase,
        }
    }

    /// Read this field from a record.
    #[must_use]
    pub fn get(self, record: &CredentialRecord) -> &str {
        match self {
            Self::Hostname => &record.hostname,
            Self::Ip => &record.ip,
            Self::Port => &record.port,
            Self::Username => &record.username,
            Self::Password => &record.password,
            Self::Key => &record.key,
            Self::KeyPassphrase => &record.key_passphrase,
        }
    }
}

/// Which storage shape a payload was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretShape {
    /// Fields live under an inner `data` map.
    Nested,
    /// Fields live at the top level.
    Flat,
}

impl CredentialRecord {
    /// Normalize the `data` object of a store response into a record.
    ///
    /// The nested shape is tried first. If the inner `data` map is missing
    /// (or is not a map), the payload is taken as flat, but only when it has
    /// a non-empty string `hostname`. Present fields holding non-string
    /// values are skipped without error.
    pub fn from_secret_data(
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<(Self, SecretShape), ConfigError> {
        let (fields, shape) = match data.get("data") {
            Some(Value::Object(inner)) => (inner, SecretShape::Nested),
            _ => {
                let has_hostname = data
                    .get(Field::Hostname.storage_key())
                    .and_then(Value::as_str)
                    .is_some_and(|h| !h.is_empty());
                if !has_hostname {
                    return Err(ConfigError::UnsupportedShape {
                        path: path.to_string(),
                    });
                }
                (data, SecretShape::Flat)
            }
        };

        let record = Self::from_fields(fields);
        record.validate(path)?;
        Ok((record, shape))
    }

    /// Copy the string-valued fields of `fields` into a fresh record.
    #[must_use]
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let mut record = Self::default();
        for field in Field::ALL {
            if let Some(Value::String(value)) = fields.get(field.storage_key()) {
                field.slot(&mut record).clone_from(value);
            }
        }
        record
    }

    /// Enforce that a password or a key is present.
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if self.password.is_empty() && self.key.is_empty() {
            return Err(ConfigError::MissingCredential {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Render the record as a flat field map (secrets included).
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        Field::ALL
            .into_iter()
            .filter(|field| !field.get(self).is_empty())
            .map(|field| {
                (
                    field.storage_key().to_string(),
                    Value::String(field.get(self).to_string()),
                )
            })
            .collect()
    }
}
