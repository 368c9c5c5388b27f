//! The journal: a forest of operation logs.

use identity::SecretKey;

use crate::cipher;
use crate::error::{Error, Result};
use crate::log::Log;
use crate::op::Model;
use crate::wire;

/// An in-memory forest of logs, plus the identifier of the log owned by
/// the local author.
///
/// Logs are looked up either by derived id (reaching any descendant) or
/// by a name path of derived current names, e.g.
/// `["alice", "movies", "main"]`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Journal {
    author_id: String,
    logs: Vec<Log>,
}

impl Journal {
    /// An empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(author_id: String, logs: Vec<Log>) -> Self {
        Self { author_id, logs }
    }

    /// Id of the local author's user log.
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Record the id of the local author's user log.
    pub fn set_author_id(&mut self, id: String) {
        self.author_id = id;
    }

    /// All top-level logs, in insertion order.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Find a log anywhere in the forest by id.
    pub fn get(&self, id: &str) -> Result<&Log> {
        self.logs
            .iter()
            .find_map(|l| l.get(id))
            .ok_or(Error::NotFound)
    }

    /// Find a log anywhere in the forest by id, mutably.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Log> {
        self.logs
            .iter_mut()
            .find_map(|l| l.get_mut(id))
            .ok_or(Error::NotFound)
    }

    /// Resolve a name path, matching each segment against derived current
    /// names. Case-sensitive.
    pub fn head_ref(&self, path: &[&str]) -> Result<&Log> {
        let (first, rest) = path.split_first().ok_or(Error::NotFound)?;
        let mut current = self
            .logs
            .iter()
            .find(|l| l.name() == *first)
            .ok_or(Error::NotFound)?;
        for segment in rest {
            current = current
                .logs
                .iter()
                .find(|l| l.name() == *segment)
                .ok_or(Error::NotFound)?;
        }
        Ok(current)
    }

    /// Merge a log into the forest.
    ///
    /// A log whose id is already present merges into it under prefix
    /// rules. An unknown log roots under its natural parent (the log its
    /// author id names) when that parent exists, and at the top level
    /// otherwise.
    pub fn merge_log(&mut self, incoming: Log) -> Result<()> {
        let id = incoming.id();
        if let Ok(local) = self.get_mut(&id) {
            return local.merge(incoming);
        }

        if incoming.model() != Model::User {
            let parent_id = incoming.author().to_string();
            if let Ok(parent) = self.get_mut(&parent_id) {
                tracing::debug!(id = %id, parent = %parent_id, "rooting log under parent");
                parent.add_child(incoming);
                return Ok(());
            }
        }

        self.logs.push(incoming);
        Ok(())
    }

    /// Physically remove the log a name path resolves to. Distinct from
    /// appending a remove op: history is erased, not tombstoned.
    pub fn remove_log(&mut self, path: &[&str]) -> Result<()> {
        let (last, parents) = path.split_last().ok_or(Error::NotFound)?;

        let siblings = if parents.is_empty() {
            &mut self.logs
        } else {
            let mut current = self
                .logs
                .iter_mut()
                .find(|l| l.name() == parents[0])
                .ok_or(Error::NotFound)?;
            for segment in &parents[1..] {
                current = current
                    .logs
                    .iter_mut()
                    .find(|l| l.name() == *segment)
                    .ok_or(Error::NotFound)?;
            }
            &mut current.logs
        };

        let idx = siblings
            .iter()
            .position(|l| l.name() == *last)
            .ok_or(Error::NotFound)?;
        siblings.remove(idx);
        Ok(())
    }

    /// Replace the entire forest with a single log.
    pub fn replace_all(&mut self, log: Log) {
        self.logs = vec![log];
    }

    /// The subtree rooted at `id` with all descendants intact, wrapped in
    /// its ancestor chain reduced to init ops only. Returns the root of
    /// the sparse chain.
    pub fn get_with_sparse_ancestors_all_descendants(&self, id: &str) -> Result<Log> {
        for top in &self.logs {
            if let Some(chain) = find_path(top, id) {
                let (target, ancestors) = chain.split_last().expect("path is non-empty");
                let mut node = (*target).clone();
                for ancestor in ancestors.iter().rev() {
                    let mut sparse = ancestor.sparse();
                    sparse.logs.push(node);
                    node = sparse;
                }
                return Ok(node);
            }
        }
        Err(Error::NotFound)
    }

    /// Serialize, then seal the canonical bytes for at-rest storage.
    pub fn encrypted_bytes(&self, key: &SecretKey) -> Result<Vec<u8>> {
        cipher::seal(key, &wire::journal_bytes(self))
    }

    /// Open an at-rest envelope and decode the journal inside it.
    pub fn decode_encrypted(key: &SecretKey, envelope: &[u8]) -> Result<Journal> {
        let plaintext = cipher::open(key, envelope)?;
        wire::decode_journal(&plaintext)
    }
}

/// Ancestor chain from `log` down to the log with the given id, inclusive
/// on both ends.
fn find_path<'a>(log: &'a Log, id: &str) -> Option<Vec<&'a Log>> {
    if log.id() == id {
        return Some(vec![log]);
    }
    for child in &log.logs {
        if let Some(mut path) = find_path(child, id) {
            path.insert(0, log);
            return Some(path);
        }
    }
    None
}
