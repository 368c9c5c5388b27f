//! Transform run state, as recorded by run operations.

use ulid::Ulid;

/// Outcome of a transform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Queued, not yet started.
    Waiting,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Finished without producing a new version.
    Unchanged,
}

impl RunStatus {
    /// Lowercase descriptor, stored in the op note field.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Waiting => "waiting",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of one transform script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Unique run identifier.
    pub id: String,
    /// Sequence number of the run within its dataset.
    pub number: i64,
    /// Current status.
    pub status: RunStatus,
    /// Run duration in nanoseconds.
    pub duration: i64,
    /// Start wall-clock, nanoseconds since the unix epoch.
    pub start_time: Option<i64>,
}

impl RunState {
    /// A fresh running state with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number: 0,
            status: RunStatus::Running,
            duration: 0,
            start_time: None,
        }
    }

    /// A fresh running state with a generated id.
    pub fn generate() -> Self {
        Self::new(Ulid::new().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RunState::generate().id, RunState::generate().id);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(RunStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
    }
}
