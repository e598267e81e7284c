//! Secret storage layout.
//!
//! Records live at `<mount>/data/<category>/<environment>/<name>` and
//! listings at `<mount>/metadata/<prefix>`.

/// Default KV mount.
pub const DEFAULT_MOUNT: &str = "secret";

/// A path relative to a KV mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPath {
    mount: String,
    segments: Vec<String>,
}

impl SecretPath {
    /// Parse a relative path such as `servers/prod/web01` under the default mount.
    ///
    /// Empty segments (leading, trailing or doubled slashes) are dropped.
    #[must_use]
    pub fn parse(relative: &str) -> Self {
        Self::with_mount(DEFAULT_MOUNT, relative)
    }

    /// Parse a relative path under a specific mount.
    #[must_use]
    pub fn with_mount(mount: &str, relative: &str) -> Self {
        Self {
            mount: mount.trim_matches('/').to_string(),
            segments: relative
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Build a record path from its three conventional components.
    #[must_use]
    pub fn record(category: &str, environment: &str, name: &str) -> Self {
        Self::parse(&format!("{category}/{environment}/{name}"))
    }

    /// The mount name.
    #[must_use]
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// The path below the mount, without `data/` or `metadata/`.
    #[must_use]
    pub fn relative(&self) -> String {
        self.segments.join("/")
    }

    /// Path used to read a record.
    #[must_use]
    pub fn data_path(&self) -> String {
        self.join("data")
    }

    /// Path used to list children.
    #[must_use]
    pub fn metadata_path(&self) -> String {
        self.join("metadata")
    }

    fn join(&self, kind: &str) -> String {
        if self.segments.is_empty() {
            format!("{}/{kind}", self.mount)
        } else {
            format!("{}/{kind}/{}", self.mount, self.relative())
        }
    }
}

impl std::fmt::Display for SecretPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.mount, self.relative())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_and_metadata_paths() {
        let path = SecretPath::record("servers", "prod", "web01");
        assert_eq!(path.data_path(), "secret/data/servers/prod/web01");
        assert_eq!(path.metadata_path(), "secret/metadata/servers/prod/web01");
    }

    #[test]
    fn stray_slashes_are_ignored() {
        let path = SecretPath::with_mount("/kv/", "/servers//staging/");
        assert_eq!(path.mount(), "kv");
        assert_eq!(path.relative(), "servers/staging");
        assert_eq!(path.metadata_path(), "kv/metadata/servers/staging");
    }

    #[test]
    fn empty_relative_lists_the_mount_root() {
        let path = SecretPath::parse("");
        assert_eq!(path.metadata_path(), "secret/metadata");
    }
}
