//! Secret resolution.
//!
//! [`SecretResolver`] reads credential records and lists secret directories
//! through any [`SecretStore`]. [`VaultClient`] is the production store.

pub mod path;
pub mod record;
pub mod retry;
pub mod store;
pub mod vault;

use serde_json::Value;

pub use path::{DEFAULT_MOUNT, SecretPath};
pub use record::{CredentialRecord, Field, SecretShape};
pub use retry::{RetryState, RetryStrategy};
#[cfg(test)]
pub use store::MemoryStore;
pub use store::{SecretData, SecretStore};
pub use vault::VaultClient;

use crate::error::{ConfigError, Error, Result, StoreOp};

/// Reads and lists credential records from a secret store.
#[derive(Debug, Clone)]
pub struct SecretResolver<S> {
    store: S,
}

impl<S: SecretStore> SecretResolver<S> {
    /// Create a resolver over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the record at `path` and normalize it.
    ///
    /// Accepts both the nested and the flat storage shape. The returned
    /// record always carries a password or a key.
    pub async fn read(&self, path: &str) -> Result<CredentialRecord> {
        let data = self
            .store
            .read(path)
            .await
            .map_err(|e| Error::store(StoreOp::Read, path, e))?
            .ok_or_else(|| ConfigError::NoSecret {
                path: path.to_string(),
            })?;

        let (record, shape) = CredentialRecord::from_secret_data(path, &data)?;
        tracing::debug!(path = %path, ?shape, "resolved credential record");
        Ok(record)
    }

    /// List the child names under `path`.
    ///
    /// A missing `keys` field or an empty listing yields an empty vector.
    /// A path that does not exist is a store error.
    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        let Some(data) = self
            .store
            .list(path)
            .await
            .map_err(|e| Error::store(StoreOp::List, path, e))?
        else {
            return Ok(Vec::new());
        };

        let keys = match data.get("keys") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ConfigError::MalformedKeys {
                    path: path.to_string(),
                    reason: format!("'keys' field is not a list: {other}"),
                }
                .into());
            }
        };

        keys.iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::from(ConfigError::MalformedKeys {
                        path: path.to_string(),
                        reason: format!("item in 'keys' is not a string: {item}"),
                    })
                })
            })
            .collect()
    }
}
