//! Plain-old-data representations of logs, intended for serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oplog::{Log, Op};

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// A human-oriented representation of a log.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainLog {
    /// Operations, in append order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ops: Vec<PlainOp>,
    /// Child logs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<PlainLog>,
}

impl From<&Log> for PlainLog {
    fn from(log: &Log) -> Self {
        Self {
            ops: log.ops.iter().map(PlainOp::from).collect(),
            logs: log.logs.iter().map(PlainLog::from).collect(),
        }
    }
}

/// A human-oriented representation of an operation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainOp {
    /// Type of operation.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Data model the operation acts on.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Identifier of the data this operation documents.
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    /// Previous reference in a causal history.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prev: String,
    /// References this operation relates to; usage is type-dependent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<String>,
    /// Human-readable name for the reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Identifier for the author.
    #[serde(rename = "authorID", default, skip_serializing_if = "String::is_empty")]
    pub author_id: String,
    /// Operation timestamp, for annotation purposes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Size of the referenced value in bytes.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    /// Operation annotation for users, e.g. a commit title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl From<&Op> for PlainOp {
    fn from(op: &Op) -> Self {
        Self {
            kind: op.kind.as_str().to_string(),
            model: op.model.as_str().to_string(),
            reference: op.reference.clone(),
            prev: op.prev.clone(),
            relations: op.relations.clone(),
            name: op.name.clone(),
            author_id: op.author_id.clone(),
            timestamp: (op.timestamp != 0).then(|| DateTime::from_timestamp_nanos(op.timestamp)),
            size: op.size,
            note: op.note.clone(),
        }
    }
}
