//! The slice of a dataset document the logbook records.
//!
//! The full dataset object graph lives outside this crate; the book only
//! consumes the fields that land in commit operations.

/// A dataset version as handed to the book by a save.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Dataset name within the author's namespace.
    pub name: String,
    /// Content-addressed path of this version.
    pub path: String,
    /// Path of the previous version, empty for the first save.
    pub previous_path: String,
    /// Commit metadata.
    pub commit: Commit,
    /// Body structure, when known.
    pub structure: Option<Structure>,
}

/// Commit metadata recorded alongside a saved version.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit wall-clock, nanoseconds since the unix epoch.
    pub timestamp: i64,
    /// Commit title.
    pub title: String,
    /// Identifier of the transform run that produced this commit, if any.
    pub run_id: String,
}

/// Body structure details.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Structure {
    /// Length of the body in bytes.
    pub length: i64,
}
