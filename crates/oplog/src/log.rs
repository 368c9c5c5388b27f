//! A single operation log: ordered ops plus child logs.

use sha2::{Digest, Sha256};

use identity::{PublicKey, SecretKey};

use crate::error::{Error, Result};
use crate::op::{Model, Op, OpType};
use crate::wire;

// multihash header for a 32-byte sha2-256 digest
const MH_SHA2_256: u8 = 0x12;
const MH_LEN: u8 = 0x20;

/// An append-only sequence of operations and a set of child logs.
///
/// The first op must be an init op; it fixes the log's identifier, model,
/// author, and initial name. Everything else about a log is derived by
/// iterating ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Ordered operations. Never shrinks.
    pub ops: Vec<Op>,
    /// Child logs. Serialized in ascending id order.
    pub logs: Vec<Log>,
    /// Detached signature over the canonical bytes of this log and all
    /// descendants. Required for logs exported to other peers.
    pub signature: Option<Vec<u8>>,
}

impl Log {
    /// Create a log from its init operation.
    pub fn init(op: Op) -> Self {
        Self {
            ops: vec![op],
            logs: Vec::new(),
            signature: None,
        }
    }

    /// The stable identifier of this log: a base-58 multihash of the
    /// canonical bytes of the init op. Unaffected by later appends.
    pub fn id(&self) -> String {
        let op = match self.ops.first() {
            Some(op) => op,
            None => return String::new(),
        };
        let digest = Sha256::digest(wire::op_bytes(op));
        let mut buf = Vec::with_capacity(2 + digest.len());
        buf.push(MH_SHA2_256);
        buf.push(MH_LEN);
        buf.extend_from_slice(&digest);
        bs58::encode(buf).into_string()
    }

    /// The model of the entity this log describes.
    pub fn model(&self) -> Model {
        self.ops[0].model
    }

    /// The author identifier recorded in the init op.
    pub fn author(&self) -> &str {
        &self.ops[0].author_id
    }

    /// The current name: the name given by the latest init-or-amend op on
    /// this log's own model.
    pub fn name(&self) -> &str {
        let model = self.model();
        let mut name = "";
        for op in &self.ops {
            if op.model == model
                && matches!(op.kind, OpType::Init | OpType::Amend)
                && !op.name.is_empty()
            {
                name = &op.name;
            }
        }
        name
    }

    /// Append an operation.
    ///
    /// An init op on the log's own model may only sit at index 0; init ops
    /// on other models (commits, pushes, runs) append freely.
    pub fn append(&mut self, op: Op) -> Result<()> {
        if op.kind == OpType::Init && op.model == self.model() && !self.ops.is_empty() {
            return Err(Error::InitNotFirst);
        }
        self.ops.push(op);
        Ok(())
    }

    /// Add a child log.
    pub fn add_child(&mut self, child: Log) {
        self.logs.push(child);
    }

    /// Find a descendant (or this log) by id.
    pub fn get(&self, id: &str) -> Option<&Log> {
        if self.id() == id {
            return Some(self);
        }
        self.logs.iter().find_map(|l| l.get(id))
    }

    /// Find a descendant (or this log) by id, mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Log> {
        if self.id() == id {
            return Some(self);
        }
        self.logs.iter_mut().find_map(|l| l.get_mut(id))
    }

    /// Merge another log with the same identifier into this one.
    ///
    /// The longer op sequence wins, and the longer must extend the shorter
    /// as a prefix; anything else is a divergent history. Children merge
    /// recursively by id.
    pub fn merge(&mut self, other: Log) -> Result<()> {
        if other.ops.len() > self.ops.len() {
            if other.ops[..self.ops.len()] != self.ops[..] {
                return Err(Error::DivergentHistory);
            }
            tracing::debug!(id = %self.id(), from = self.ops.len(), to = other.ops.len(), "extending log");
            self.ops = other.ops;
            // the old signature no longer covers the op sequence
            self.signature = other.signature;
        } else if self.ops[..other.ops.len()] != other.ops[..] {
            return Err(Error::DivergentHistory);
        }

        for child in other.logs {
            let id = child.id();
            match self.logs.iter_mut().find(|l| l.id() == id) {
                Some(local) => local.merge(child)?,
                None => self.logs.push(child),
            }
        }
        Ok(())
    }

    /// A copy of this log reduced to its init op, with no children.
    /// Proves lineage and authorship without leaking anything else.
    pub fn sparse(&self) -> Log {
        Log {
            ops: vec![self.ops[0].clone()],
            logs: Vec::new(),
            signature: None,
        }
    }

    /// Sign the canonical bytes of this log, including all descendants.
    pub fn sign(&mut self, key: &SecretKey) {
        let sig = key.sign(&wire::log_signed_bytes(self));
        self.signature = Some(sig.to_bytes().to_vec());
    }

    /// Verify the stored signature against a public key. A missing
    /// signature fails verification.
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        let sig = self.signature.as_deref().ok_or(Error::SignatureInvalid)?;
        let sig = identity::Signature::from_bytes(sig).map_err(|_| Error::SignatureInvalid)?;
        key.verify(&wire::log_signed_bytes(self), &sig)
            .map_err(|_| Error::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_log(name: &str) -> Log {
        Log::init(Op {
            name: name.into(),
            author_id: "profile-id".into(),
            timestamp: 1,
            ..Op::new(OpType::Init, Model::User)
        })
    }

    fn commit_op(path: &str, ts: i64) -> Op {
        Op {
            reference: path.into(),
            timestamp: ts,
            ..Op::new(OpType::Init, Model::Commit)
        }
    }

    #[test]
    fn test_id_is_stable_across_appends() {
        let mut log = user_log("alice");
        let id = log.id();
        assert!(!id.is_empty());

        log.append(Op {
            name: "alicia".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();
        assert_eq!(log.id(), id);
    }

    #[test]
    fn test_ids_differ_per_init_op() {
        assert_ne!(user_log("alice").id(), user_log("bob").id());
    }

    #[test]
    fn test_name_follows_amends() {
        let mut log = user_log("alice");
        assert_eq!(log.name(), "alice");

        log.append(Op {
            name: "alicia".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();
        assert_eq!(log.name(), "alicia");
    }

    #[test]
    fn test_name_ignores_other_models() {
        let mut branch = Log::init(Op {
            name: "main".into(),
            ..Op::new(OpType::Init, Model::Branch)
        });
        let mut op = commit_op("/mem/Qa", 2);
        op.name = "not-a-branch-name".into();
        branch.append(op).unwrap();
        assert_eq!(branch.name(), "main");
    }

    #[test]
    fn test_append_rejects_second_root_init() {
        let mut log = user_log("alice");
        let err = log
            .append(Op {
                name: "mallory".into(),
                ..Op::new(OpType::Init, Model::User)
            })
            .unwrap_err();
        assert!(matches!(err, Error::InitNotFirst));
        assert_eq!(log.ops.len(), 1);
    }

    #[test]
    fn test_merge_extends_with_longer_prefix() {
        let mut a = user_log("alice");
        let mut b = a.clone();
        b.append(Op {
            name: "alicia".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();

        a.merge(b.clone()).unwrap();
        assert_eq!(a.ops, b.ops);

        // merging the shorter back is a no-op
        let snapshot = a.clone();
        a.merge(user_log("alice")).unwrap();
        assert_eq!(a, snapshot);
    }

    #[test]
    fn test_merge_rejects_divergence() {
        let base = user_log("alice");

        let mut a = base.clone();
        a.append(Op {
            name: "left".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();

        let mut b = base;
        b.append(Op {
            name: "right".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();

        assert!(matches!(a.merge(b.clone()), Err(Error::DivergentHistory)));
        assert!(matches!(b.merge(a), Err(Error::DivergentHistory)));
    }

    #[test]
    fn test_merge_recurses_into_children() {
        let mut a = user_log("alice");
        let mut ds = Log::init(Op {
            name: "movies".into(),
            author_id: a.id(),
            ..Op::new(OpType::Init, Model::Dataset)
        });
        a.add_child(ds.clone());

        let mut b = a.clone();
        let remote_ds = b.get_mut(&ds.id()).unwrap();
        remote_ds.append(commit_op("/mem/Qa", 5)).unwrap();

        a.merge(b).unwrap();
        ds.append(commit_op("/mem/Qa", 5)).unwrap();
        assert_eq!(a.get(&ds.id()).unwrap().ops, ds.ops);
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SecretKey::generate();
        let mut log = user_log("alice");
        log.sign(&key);

        log.verify(&key.public()).unwrap();

        // wrong key
        let other = SecretKey::generate();
        assert!(matches!(
            log.verify(&other.public()),
            Err(Error::SignatureInvalid)
        ));

        // tampering after signing
        log.append(Op {
            name: "mallory".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();
        assert!(matches!(
            log.verify(&key.public()),
            Err(Error::SignatureInvalid)
        ));
    }

    #[test]
    fn test_verify_requires_signature() {
        let key = SecretKey::generate();
        let log = user_log("alice");
        assert!(matches!(
            log.verify(&key.public()),
            Err(Error::SignatureInvalid)
        ));
    }

    #[test]
    fn test_sparse_strips_history_and_children() {
        let mut log = user_log("alice");
        log.append(Op {
            name: "alicia".into(),
            ..Op::new(OpType::Amend, Model::User)
        })
        .unwrap();
        log.add_child(Log::init(Op {
            name: "movies".into(),
            ..Op::new(OpType::Init, Model::Dataset)
        }));

        let sparse = log.sparse();
        assert_eq!(sparse.ops.len(), 1);
        assert!(sparse.logs.is_empty());
        assert_eq!(sparse.id(), log.id());
        assert_eq!(sparse.name(), "alice");
    }
}
