//! Dataset references and version summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a username or dataset name.
pub const MAX_NAME_LENGTH: usize = 80;

/// Whether a string is usable as a username or dataset name:
/// 1–80 characters drawn from `[a-zA-Z0-9_-]`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A human-readable dataset reference, resolvable to an init id and a head
/// path.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    /// Name of the user the dataset belongs to.
    pub username: String,
    /// Identifier of the owning profile.
    pub profile_id: String,
    /// Dataset name within the user's namespace.
    pub name: String,
    /// Content-addressed path of a dataset version.
    pub path: String,
    /// Stable identifier of the dataset's log.
    pub init_id: String,
}

impl Ref {
    /// A bare `username/name` alias.
    pub fn alias(username: &str, name: &str) -> Self {
        Self {
            username: username.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.username, self.name)?;
        if !self.path.is_empty() {
            write!(f, "@{}", self.path)?;
        }
        Ok(())
    }
}

/// One entry in a dataset's collapsed history: a saved version, a
/// transform run, or both merged into a single record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Owner username, copied from the resolving reference.
    pub username: String,
    /// Owner profile id, copied from the resolving reference.
    pub profile_id: String,
    /// Dataset name, copied from the resolving reference.
    pub name: String,
    /// Content-addressed path of this version. Empty for run-only entries.
    pub path: String,
    /// Commit (or run start) time.
    pub commit_time: Option<DateTime<Utc>>,
    /// Commit title.
    pub commit_title: String,
    /// Size of the version body in bytes.
    pub body_size: i64,
    /// Identifier of the transform run that produced this version.
    pub run_id: String,
    /// Status of the run, e.g. "succeeded".
    pub run_status: String,
    /// Duration of the run in nanoseconds.
    pub run_duration: i64,
    /// Whether an outstanding push publishes this version.
    pub published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["movies", "a", "b5", "world_bank-data", "A-1_b"] {
            assert!(is_valid_name(name), "{name:?} should be valid");
        }
        assert!(is_valid_name(&"x".repeat(MAX_NAME_LENGTH)));
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "with space", "s/lash", "dot.dot", "ünïcode", "semi;colon"] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
        }
        assert!(!is_valid_name(&"x".repeat(MAX_NAME_LENGTH + 1)));
    }

    #[test]
    fn test_ref_display() {
        let mut r = Ref::alias("alice", "movies");
        assert_eq!(r.to_string(), "alice/movies");
        r.path = "/mem/QmExample".into();
        assert_eq!(r.to_string(), "alice/movies@/mem/QmExample");
    }
}
