//! Host identity verification.
//!
//! The session engine asks a [`HostKeyVerifier`] about every server key it
//! sees during the handshake. [`KnownHosts`] checks an OpenSSH `known_hosts`
//! file and is the default.

use std::io::Write;
use std::path::{Path, PathBuf};

use russh::keys::{HashAlg, PublicKey};

/// Decides whether a server's host key is trusted.
pub trait HostKeyVerifier: Send + Sync + std::fmt::Debug {
    /// Return `true` to continue the handshake with `key`.
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool;
}

/// What to do with hosts that have no `known_hosts` entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Record the key and accept it.
    #[default]
    TrustOnFirstUse,
    /// Reject the connection.
    Strict,
}

/// Result of looking a key up in `known_hosts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// An entry for the host holds this key.
    Match,
    /// The host has entries, none of them with this key.
    Mismatch,
    /// The host has no entries.
    Unknown,
}

/// Verifier backed by an OpenSSH `known_hosts` file.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
    policy: HostKeyPolicy,
}

impl Default for KnownHosts {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl KnownHosts {
    /// Use the file at `path` with the trust-on-first-use policy.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: HostKeyPolicy::default(),
        }
    }

    /// Set the policy for unknown hosts.
    #[must_use]
    pub const fn with_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `$SSH_KNOWN_HOSTS`, else `~/.ssh/known_hosts`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("SSH_KNOWN_HOSTS") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ssh")
            .join("known_hosts")
    }

    /// The file in use.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The policy for unknown hosts.
    #[must_use]
    pub const fn policy(&self) -> HostKeyPolicy {
        self.policy
    }

    /// Look `key` up for `host:port`. A missing or unreadable file means
    /// every host is unknown.
    #[must_use]
    pub fn lookup(&self, host: &str, port: u16, key: &PublicKey) -> Lookup {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to read known_hosts");
                }
                return Lookup::Unknown;
            }
        };

        let pattern = host_pattern(host, port);
        let fingerprint = key.fingerprint(HashAlg::Sha256);
        let mut seen_host = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(hosts), Some(_key_type), Some(key_data)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            if !hosts.split(',').any(|h| h == pattern) {
                continue;
            }
            seen_host = true;

            match russh::keys::parse_public_key_base64(key_data) {
                Ok(stored) if stored.fingerprint(HashAlg::Sha256) == fingerprint => {
                    return Lookup::Match;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(host = %host, error = %e, "skipping unparsable known_hosts entry"),
            }
        }

        if seen_host {
            Lookup::Mismatch
        } else {
            Lookup::Unknown
        }
    }

    /// Append an entry for `host:port`, creating the file and its directory.
    pub fn record(&self, host: &str, port: u16, key: &PublicKey) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let encoded = key
            .to_openssh()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let key_str = encoded.split_whitespace().take(2).collect::<Vec<_>>().join(" ");

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {key_str}", host_pattern(host, port))
    }
}

impl HostKeyVerifier for KnownHosts {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match self.lookup(host, port, key) {
            Lookup::Match => {
                tracing::debug!(host = %host, port, "host key verified against known_hosts");
                true
            }
            Lookup::Mismatch => {
                tracing::error!(
                    host = %host,
                    port,
                    fingerprint = %key.fingerprint(HashAlg::Sha256),
                    path = %self.path.display(),
                    "HOST KEY MISMATCH! Possible man-in-the-middle attack!"
                );
                false
            }
            Lookup::Unknown => match self.policy {
                HostKeyPolicy::Strict => {
                    tracing::warn!(host = %host, port, "host not found in known_hosts, rejecting");
                    false
                }
                HostKeyPolicy::TrustOnFirstUse => {
                    match self.record(host, port, key) {
                        Ok(()) => tracing::info!(
                            host = %host,
                            port,
                            fingerprint = %key.fingerprint(HashAlg::Sha256),
                            path = %self.path.display(),
                            "added host key to known_hosts"
                        ),
                        Err(e) => tracing::warn!(
                            host = %host,
                            error = %e,
                            "failed to save host key, accepting without saving"
                        ),
                    }
                    true
                }
            },
        }
    }
}

/// Accepts every host key.
///
/// Only for disposable lab hosts. Never used unless selected explicitly.
#[cfg(feature = "insecure-skip-verify")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyHostKey;

#[cfg(feature = "insecure-skip-verify")]
impl AcceptAnyHostKey {
    /// Create the verifier.
    #[must_use]
    pub const fn insecure() -> Self {
        Self
    }
}

#[cfg(feature = "insecure-skip-verify")]
impl HostKeyVerifier for AcceptAnyHostKey {
    fn verify(&self, host: &str, port: u16, _key: &PublicKey) -> bool {
        tracing::warn!(host = %host, port, "accepting server key without verification (INSECURE)");
        true
    }
}

/// `host` for port 22, `[host]:port` otherwise.
fn host_pattern(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}
