//! Per-peer dataset version history.
//!
//! As a user works on datasets they build a log of operations: creating a
//! dataset, saving a version, publishing to a remote, deleting. Each
//! operation lands in a signed, append-only log attributed to its author,
//! stored under the dataset's namespace. Current state (reference
//! resolution, commit lists, publish status) is always derived by
//! iterating operations, never stored.
//!
//! The [`Book`] is the entry point. It owns a private key, persists an
//! encrypted journal through a [`Filesystem`], and publishes domain
//! events on a best-effort [`Publisher`].

pub mod book;
pub mod cancel;
pub mod dataset;
pub mod derive;
pub mod error;
pub mod event;
pub mod fs;
pub mod plain;
pub mod refs;
pub mod run;

pub use book::{dsref_alias_for_log, Book, PushRollback, DEFAULT_BRANCH_NAME};
pub use cancel::Cancel;
pub use dataset::{Commit, Dataset, Structure};
pub use derive::LogEntry;
pub use error::{Error, Result};
pub use event::{ChannelBus, DsChange, Event, NoopBus, Publisher};
pub use fs::{DirFilesystem, Filesystem, MemFilesystem};
pub use plain::{PlainLog, PlainOp};
pub use refs::{is_valid_name, Ref, VersionInfo};
pub use run::{RunState, RunStatus};
