//! Domain events emitted after successful persists.
//!
//! Publication is best-effort: the bus is a capability injected at
//! construction, and a publish failure never rolls back the operation
//! that produced the event.

use crate::refs::VersionInfo;

/// Payload carried by every dataset change event. Fields irrelevant to a
/// given event are left at their defaults.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DsChange {
    /// Stable identifier of the dataset log.
    pub init_id: String,
    /// Owner username.
    pub username: String,
    /// Owner profile id.
    pub profile_id: String,
    /// Human-readable dataset name.
    pub pretty_name: String,
    /// Branch-log index relevant to the change.
    pub top_index: i64,
    /// Head path after the change.
    pub head_ref: String,
    /// Collapsed version record for the change.
    pub info: Option<VersionInfo>,
}

/// A dataset lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A dataset name was initialized.
    DatasetNameInit(DsChange),
    /// A dataset was renamed.
    DatasetRename(DsChange),
    /// A dataset was deleted.
    DatasetDeleteAll(DsChange),
    /// A branch's commit list changed.
    DatasetCommitChange(DsChange),
}

/// Failure to hand an event to the bus.
#[derive(Debug, thiserror::Error)]
#[error("event publication failed: {0}")]
pub struct PublishError(pub String);

/// A best-effort event bus.
pub trait Publisher: Send + Sync {
    /// Deliver one event. Errors are logged and swallowed by the caller.
    fn publish(&self, event: Event) -> Result<(), PublishError>;
}

/// A bus that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBus;

impl Publisher for NoopBus {
    fn publish(&self, _event: Event) -> Result<(), PublishError> {
        Ok(())
    }
}

/// A bus backed by an unbounded channel, mainly for tests and in-process
/// subscribers.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: crossbeam_channel::Sender<Event>,
}

impl ChannelBus {
    /// A new bus plus the receiving end of its channel.
    pub fn new() -> (Self, crossbeam_channel::Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelBus {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        self.tx
            .send(event)
            .map_err(|err| PublishError(err.to_string()))
    }
}
