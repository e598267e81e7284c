//! Environment-based configuration.

use std::collections::HashMap;

/// Prefix for vaultsh's own variables (`VAULTSH_CONFIG`, `VAULTSH_ENV`).
pub const DEFAULT_PREFIX: &str = "VAULTSH";

/// Prefix for the standard Vault variables (`VAULT_ADDR`, `VAULT_TOKEN`).
pub const VAULT_PREFIX: &str = "VAULT";

/// Variable names, without prefix.
pub mod vars {
    /// Config file path (`VAULTSH_CONFIG`).
    pub const CONFIG: &str = "CONFIG";
    /// Environment name (`VAULTSH_ENV`).
    pub const ENV: &str = "ENV";
    /// Server address (`VAULT_ADDR`).
    pub const ADDR: &str = "ADDR";
    /// Access token (`VAULT_TOKEN`).
    pub const TOKEN: &str = "TOKEN";
}

/// Environment variable reader.
///
/// Values set with [`EnvConfig::with_value`] shadow the process
/// environment. Empty values count as unset.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Values that shadow the process environment.
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Reader for the standard `VAULT_*` variables.
    #[must_use]
    pub fn vault() -> Self {
        Self::new(VAULT_PREFIX)
    }

    /// Shadow `name` with a fixed value.
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.overrides.insert(self.var_name(name), value.into());
        self
    }

    /// Build the full environment variable name.
    #[must_use]
    pub fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        self.overrides
            .get(&var_name)
            .cloned()
            .or_else(|| std::env::var(&var_name).ok())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_names() {
        assert_eq!(EnvConfig::default().var_name("config"), "VAULTSH_CONFIG");
        assert_eq!(EnvConfig::vault().var_name(vars::ADDR), "VAULT_ADDR");
        assert_eq!(EnvConfig::new("").var_name("token"), "TOKEN");
    }

    #[test]
    fn overrides_shadow_process_env() {
        let env = EnvConfig::new("VAULTSH_TEST_UNSET_PREFIX")
            .with_value(vars::TOKEN, "s.shadow")
            .with_value("empty", "");

        assert_eq!(env.get(vars::TOKEN).as_deref(), Some("s.shadow"));
        assert_eq!(env.get("token").as_deref(), Some("s.shadow"));
        assert_eq!(env.get("empty"), None);
        assert_eq!(env.get("missing"), None);
    }
}
