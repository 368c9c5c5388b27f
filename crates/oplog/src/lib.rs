//! Append-only operation logs.
//!
//! An operation log is an ordered sequence of signed, immutable operations
//! plus a set of child logs. Logs form a forest managed by a [`Journal`]:
//! lookup by derived identifier or by name path, prefix-only merging of
//! foreign logs, canonical binary encoding, and an encrypted at-rest form.
//!
//! This crate knows nothing about datasets or users; it stores opaque
//! operations and derives structure from them.

pub mod cipher;
pub mod error;
pub mod journal;
pub mod log;
pub mod op;
pub mod wire;

pub use error::{Error, Result};
pub use journal::Journal;
pub use log::Log;
pub use op::{Model, Op, OpType};
