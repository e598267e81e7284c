//! The secret store seam.

use std::future::Future;

use serde_json::{Map, Value};

use crate::error::StoreError;

/// The `data` object of a store response.
pub type SecretData = Map<String, Value>;

/// A path-addressed secret store supporting reads and directory listings.
///
/// Both operations return the `data` object of the response, or `None` when
/// the store answered successfully without one.
pub trait SecretStore: Send + Sync {
    /// Fetch the raw payload stored at `path`.
    fn read(&self, path: &str)
    -> impl Future<Output = Result<Option<SecretData>, StoreError>> + Send;

    /// Fetch the raw listing of `path`.
    fn list(&self, path: &str)
    -> impl Future<Output = Result<Option<SecretData>, StoreError>> + Send;
}

impl<S: SecretStore> SecretStore for &S {
    fn read(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<SecretData>, StoreError>> + Send {
        (**self).read(path)
    }

    fn list(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<SecretData>, StoreError>> + Send {
        (**self).list(path)
    }
}

/// In-memory store used by tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, Option<Value>>,
}

#[cfg(test)]
impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a response `data` value at `path`.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, data: Value) -> Self {
        self.entries.insert(path.into(), Some(data));
        self
    }

    /// Record a path that exists but answers without `data`.
    #[must_use]
    pub fn with_empty(mut self, path: impl Into<String>) -> Self {
        self.entries.insert(path.into(), None);
        self
    }

    fn lookup(&self, path: &str) -> Result<Option<SecretData>, StoreError> {
        match self.entries.get(path) {
            None => Err(StoreError::NotFound),
            Some(None) => Ok(None),
            Some(Some(Value::Object(map))) => Ok(Some(map.clone())),
            Some(Some(other)) => Err(StoreError::Decode {
                reason: format!("'data' is not an object: {other}"),
            }),
        }
    }
}

#[cfg(test)]
impl SecretStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<SecretData>, StoreError> {
        self.lookup(path)
    }

    async fn list(&self, path: &str) -> Result<Option<SecretData>, StoreError> {
        self.lookup(path)
    }
}
