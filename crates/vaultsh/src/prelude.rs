//! Convenient re-exports for common vaultsh usage.
//!
//! ```ignore
//! use vaultsh::prelude::*;
//! ```

// Error handling
pub use crate::error::{Error, Result};

// Secret resolution
pub use crate::secret::{CredentialRecord, SecretPath, SecretResolver, SecretStore, VaultClient};

// Targets and authentication
pub use crate::auth::AuthStrategy;
pub use crate::target::ConnectionTarget;

// Sessions
pub use crate::hostkey::{HostKeyPolicy, HostKeyVerifier, KnownHosts};
pub use crate::session::{
    ExitStatusPolicy, LocalStreams, SessionEngine, SessionOptions, SessionOutcome, cancellation,
    open_shell,
};

// Configuration
pub use crate::config::{ConfigLoader, Settings};
