//! HashiCorp Vault HTTP store.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::retry::{RetryState, RetryStrategy};
use super::store::{SecretData, SecretStore};
use crate::config::{EnvironmentSettings, TlsSettings};
use crate::error::{SettingsError, StoreError};

/// Longest error body kept in [`StoreError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Vault client speaking the logical HTTP API (`/v1/<path>`).
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
    token: String,
    retry: RetryStrategy,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("retry", &self.retry)
            .finish()
    }
}

impl VaultClient {
    /// Create a client with default HTTP settings and no retries.
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Result<Self, SettingsError> {
        let http = base_builder(Duration::from_secs(30))
            .build()
            .map_err(|e| SettingsError::Client {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            address: address.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryStrategy::none(),
        })
    }

    /// Create a client from a validated environment.
    pub fn from_settings(settings: &EnvironmentSettings) -> Result<Self, SettingsError> {
        let builder = base_builder(Duration::from_secs(settings.timeout));
        let builder = configure_tls(builder, &settings.tls)?;
        let http = builder.build().map_err(|e| SettingsError::Client {
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            address: settings.address.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            retry: settings.retry.strategy(),
        })
    }

    /// Replace the retry strategy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// The server address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    async fn request(&self, path: &str, list: bool) -> Result<Option<SecretData>, StoreError> {
        let mut retry = RetryState::new(self.retry.clone());
        loop {
            match self.send_once(path, list).await {
                Err(err) if is_retryable(&err) => match retry.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            path = %path,
                            attempt = retry.attempt(),
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Vault request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
                other => return other,
            }
        }
    }

    async fn send_once(&self, path: &str, list: bool) -> Result<Option<SecretData>, StoreError> {
        let mut request = self
            .http
            .get(self.url(path))
            .header("X-Vault-Token", &self.token)
            .header("X-Vault-Request", "true");
        if list {
            request = request.query(&[("list", "true")]);
        }

        tracing::debug!(path = %path, list, "Vault request");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })?;
        extract_data(body)
    }
}

impl SecretStore for VaultClient {
    async fn read(&self, path: &str) -> Result<Option<SecretData>, StoreError> {
        self.request(path, false).await
    }

    async fn list(&self, path: &str) -> Result<Option<SecretData>, StoreError> {
        self.request(path, true).await
    }
}

fn base_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(format!("vaultsh/{}", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
}

fn configure_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsSettings,
) -> Result<reqwest::ClientBuilder, SettingsError> {
    if !tls.verify {
        tracing::warn!("TLS verification disabled for Vault connection");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ca_cert) = &tls.ca_cert {
        let pem = read_pem(ca_cert)?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| SettingsError::Client {
            message: format!("invalid CA certificate {}: {e}", ca_cert.display()),
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if let (Some(cert), Some(key)) = (&tls.client_cert, &tls.client_key) {
        let mut pem = read_pem(cert)?;
        pem.extend(read_pem(key)?);
        let identity = reqwest::Identity::from_pem(&pem).map_err(|e| SettingsError::Client {
            message: format!("invalid client certificate {}: {e}", cert.display()),
        })?;
        builder = builder.identity(identity);
    }

    Ok(builder)
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, SettingsError> {
    std::fs::read(path).map_err(|source| SettingsError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn extract_data(body: Value) -> Result<Option<SecretData>, StoreError> {
    let Value::Object(mut body) = body else {
        return Err(StoreError::Decode {
            reason: "response body is not a JSON object".to_string(),
        });
    };
    match body.remove("data") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(data)) => Ok(Some(data)),
        Some(other) => Err(StoreError::Decode {
            reason: format!("'data' is not an object: {other}"),
        }),
    }
}

fn is_retryable(err: &StoreError) -> bool {
    match err {
        StoreError::Http(e) => e.is_connect() || e.is_timeout(),
        StoreError::Status { status, .. } => *status >= 500,
        StoreError::NotFound | StoreError::Decode { .. } => false,
    }
}
