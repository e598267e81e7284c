//! Dialing and authentication over russh.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};

use crate::auth::AuthStrategy;
use crate::error::TransportError;
use crate::hostkey::HostKeyVerifier;

/// Client handler that defers host key decisions to a [`HostKeyVerifier`].
pub struct ClientHandler {
    verifier: Arc<dyn HostKeyVerifier>,
    host: String,
    port: u16,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(self.verifier.verify(&self.host, self.port, server_public_key))
    }
}

/// An authenticated-or-not connection handle.
pub type Handle = client::Handle<ClientHandler>;

/// Open the transport to `host:port` and run the key exchange.
pub async fn dial(
    address: &str,
    host: &str,
    port: u16,
    verifier: Arc<dyn HostKeyVerifier>,
    connect_timeout: Duration,
) -> Result<Handle, TransportError> {
    let config = Arc::new(client::Config::default());
    let handler = ClientHandler {
        verifier,
        host: host.to_string(),
        port,
    };

    tracing::info!(host = %host, port, "connecting to SSH server");
    tokio::time::timeout(connect_timeout, client::connect(config, (host, port), handler))
        .await
        .map_err(|_| TransportError::Timeout {
            address: address.to_string(),
            after: connect_timeout,
        })?
        .map_err(|e| match e {
            russh::Error::UnknownKey => TransportError::HostKeyRejected {
                address: address.to_string(),
            },
            source => TransportError::Dial {
                address: address.to_string(),
                source,
            },
        })
}

/// Offer each strategy in order until one is accepted.
pub async fn authenticate(
    handle: &mut Handle,
    address: &str,
    user: &str,
    strategies: &[AuthStrategy],
) -> Result<(), TransportError> {
    for strategy in strategies {
        tracing::debug!(user = %user, method = strategy.method(), "attempting authentication");

        let result = match strategy {
            AuthStrategy::PublicKey(key) => {
                // Result<Option<Option<HashAlg>>, _>
                let rsa_hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::clone(key), rsa_hash))
                    .await
            }
            AuthStrategy::Password(password) => handle.authenticate_password(user, password).await,
        };

        match result {
            Ok(outcome) if outcome.success() => {
                tracing::info!(user = %user, method = strategy.method(), "authentication successful");
                return Ok(());
            }
            Ok(_) => {
                tracing::debug!(user = %user, method = strategy.method(), "authentication rejected");
            }
            Err(e) => {
                tracing::debug!(user = %user, method = strategy.method(), error = %e, "authentication error");
            }
        }
    }

    Err(TransportError::Authentication {
        address: address.to_string(),
        user: user.to_string(),
    })
}
