//! The operation record: one intent against one model entity.

/// The intent of an operation.
///
/// Numeric values are wire-stable; they appear in the canonical encoding
/// and must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpType {
    /// Creates an entity.
    Init = 1,
    /// Modifies an entity, last-writer-wins.
    Amend = 2,
    /// Tombstones an entity (or a count of prior entries).
    Remove = 3,
}

impl OpType {
    /// Decode a wire byte into an op type.
    pub fn from_wire(b: u8) -> Option<Self> {
        match b {
            1 => Some(OpType::Init),
            2 => Some(OpType::Amend),
            3 => Some(OpType::Remove),
            _ => None,
        }
    }

    /// Short lowercase descriptor, used in human-facing output.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Init => "init",
            OpType::Amend => "amend",
            OpType::Remove => "remove",
        }
    }
}

/// The kind of entity an operation acts on.
///
/// Numeric values are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Model {
    /// A peer's top-level log.
    User = 1,
    /// A dataset owned by a user.
    Dataset = 2,
    /// A line of commits within a dataset.
    Branch = 3,
    /// One saved dataset version.
    Commit = 4,
    /// Publication of versions to a remote.
    Push = 5,
    /// Execution of a transform script.
    Run = 6,
    /// Access control changes.
    Acl = 7,
}

impl Model {
    /// Decode a wire value into a model.
    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            1 => Some(Model::User),
            2 => Some(Model::Dataset),
            3 => Some(Model::Branch),
            4 => Some(Model::Commit),
            5 => Some(Model::Push),
            6 => Some(Model::Run),
            7 => Some(Model::Acl),
            _ => None,
        }
    }

    /// Unique lowercase descriptor for a model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::User => "user",
            Model::Dataset => "dataset",
            Model::Branch => "branch",
            Model::Commit => "commit",
            Model::Push => "push",
            Model::Run => "run",
            Model::Acl => "acl",
        }
    }
}

/// One immutable record in a log.
///
/// Field meaning is payload-specific: a commit op carries a content-hash
/// path in `reference` and a body size in `size`, a run op carries a run id
/// in `reference` and a duration in `size`, a push-remove op carries a
/// count of unpublished revisions in `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    /// Intent of the operation.
    pub kind: OpType,
    /// Entity kind the operation acts on.
    pub model: Model,
    /// Identifier of the data this operation documents.
    pub reference: String,
    /// Previous `reference` in a causal chain.
    pub prev: String,
    /// Typed cross-references; usage is operation-type dependent.
    pub relations: Vec<String>,
    /// Human-readable name for the entity at the time of the op.
    pub name: String,
    /// Identifier of the author that wrote the op.
    pub author_id: String,
    /// Author wall-clock, nanoseconds since the unix epoch.
    pub timestamp: i64,
    /// Payload-specific metric.
    pub size: i64,
    /// Free-form annotation, e.g. a commit title or run status.
    pub note: String,
}

impl Op {
    /// A zeroed operation of the given kind and model, for use with struct
    /// update syntax at call sites.
    pub fn new(kind: OpType, model: Model) -> Self {
        Self {
            kind,
            model,
            reference: String::new(),
            prev: String::new(),
            relations: Vec::new(),
            name: String::new(),
            author_id: String::new(),
            timestamp: 0,
            size: 0,
            note: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_stable() {
        assert_eq!(OpType::Init as u8, 1);
        assert_eq!(OpType::Amend as u8, 2);
        assert_eq!(OpType::Remove as u8, 3);

        assert_eq!(Model::User as u32, 1);
        assert_eq!(Model::Dataset as u32, 2);
        assert_eq!(Model::Branch as u32, 3);
        assert_eq!(Model::Commit as u32, 4);
        assert_eq!(Model::Push as u32, 5);
        assert_eq!(Model::Run as u32, 6);
        assert_eq!(Model::Acl as u32, 7);
    }

    #[test]
    fn test_wire_roundtrip() {
        for kind in [OpType::Init, OpType::Amend, OpType::Remove] {
            assert_eq!(OpType::from_wire(kind as u8), Some(kind));
        }
        assert_eq!(OpType::from_wire(0), None);
        assert_eq!(OpType::from_wire(4), None);

        for model in [
            Model::User,
            Model::Dataset,
            Model::Branch,
            Model::Commit,
            Model::Push,
            Model::Run,
            Model::Acl,
        ] {
            assert_eq!(Model::from_wire(model as u32), Some(model));
        }
        assert_eq!(Model::from_wire(0), None);
        assert_eq!(Model::from_wire(8), None);
    }
}
