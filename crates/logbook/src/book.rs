//! The book: a domain-level facade over an operation-log journal.
//!
//! A book is owned by a single signing key. Every write appends to the
//! in-memory forest, persists the encrypted journal, and then publishes a
//! best-effort domain event. A single lock guards the forest, the
//! persisted-location string, and the author-name cache; writers hold it
//! for the full append + persist duration.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::DateTime;
use parking_lot::RwLock;

use identity::{PublicKey, SecretKey};
use oplog::{Journal, Log, Model, Op, OpType};

use crate::cancel::Cancel;
use crate::dataset::Dataset;
use crate::derive::{
    branch_to_version_infos, latest_save_path, log_entry_from_op, LogEntry, RUN_ID_REL_PREFIX,
};
use crate::error::{Error, Result};
use crate::event::{DsChange, Event, Publisher};
use crate::fs::Filesystem;
use crate::plain::PlainLog;
use crate::refs::{is_valid_name, Ref, VersionInfo};
use crate::run::RunState;

/// The branch name all branch-level data is read from and written to.
/// Branches are not yet a user-facing feature, but the log structure
/// supports them.
pub const DEFAULT_BRANCH_NAME: &str = "main";

fn default_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

struct BookState {
    journal: Journal,
    location: String,
    author_id: String,
    author_name: String,
}

/// A single author's logbook.
pub struct Book {
    secret: SecretKey,
    fs: Arc<dyn Filesystem>,
    publisher: Arc<dyn Publisher>,
    new_timestamp: fn() -> i64,
    state: RwLock<BookState>,
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book").finish_non_exhaustive()
    }
}

impl Book {
    /// Open a logbook owned by a single author, reading any existing data
    /// at the given filesystem location. Books are encrypted at rest with
    /// the author's key; an absent location means a fresh book, which
    /// triggers owner initialization.
    pub fn open(
        secret: SecretKey,
        username: &str,
        publisher: Arc<dyn Publisher>,
        fs: Arc<dyn Filesystem>,
        location: &str,
        cancel: &Cancel,
    ) -> Result<Book> {
        if !is_valid_name(username) {
            return Err(Error::InvalidName(username.to_string()));
        }

        let book = Book {
            secret,
            fs,
            publisher,
            new_timestamp: default_timestamp,
            state: RwLock::new(BookState {
                journal: Journal::new(),
                location: location.to_string(),
                author_id: String::new(),
                author_name: username.to_string(),
            }),
        };

        match book.load(cancel) {
            Ok(()) => Ok(book),
            Err(Error::NotFound) => {
                let profile_id = identity::id_from_secret_key(&book.secret);
                book.initialize(&profile_id, cancel)?;
                Ok(book)
            }
            Err(err) => Err(err),
        }
    }

    /// Open a logbook with an explicit profile id, overwriting any
    /// existing data at the location.
    pub fn open_overwrite_with_profile_id(
        secret: SecretKey,
        username: &str,
        publisher: Arc<dyn Publisher>,
        fs: Arc<dyn Filesystem>,
        location: &str,
        profile_id: &str,
        cancel: &Cancel,
    ) -> Result<Book> {
        if !is_valid_name(username) {
            return Err(Error::InvalidName(username.to_string()));
        }
        if profile_id.is_empty() {
            return Err(Error::Malformed("profile id is required".into()));
        }

        let book = Book {
            secret,
            fs,
            publisher,
            new_timestamp: default_timestamp,
            state: RwLock::new(BookState {
                journal: Journal::new(),
                location: location.to_string(),
                author_id: String::new(),
                author_name: username.to_string(),
            }),
        };
        book.initialize(profile_id, cancel)?;
        Ok(book)
    }

    fn initialize(&self, profile_id: &str, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        let mut state = self.state.write();

        let user_log = Log::init(Op {
            name: state.author_name.clone(),
            author_id: profile_id.to_string(),
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Init, Model::User)
        });
        state.author_id = user_log.id();
        let author_id = state.author_id.clone();
        state.journal.set_author_id(author_id);
        state.journal.merge_log(user_log)?;

        self.save_locked(&mut state, cancel)
    }

    fn load(&self, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        let mut state = self.state.write();
        let envelope = self.fs.get(&state.location)?;
        let journal = Journal::decode_encrypted(&self.secret, &envelope)?;
        state.author_id = journal.author_id().to_string();
        state.journal = journal;
        Ok(())
    }

    fn save_locked(&self, state: &mut BookState, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        let envelope = state.journal.encrypted_bytes(&self.secret)?;
        state.location = self.fs.put(&envelope)?;
        Ok(())
    }

    fn publish(&self, event: Event) {
        if let Err(err) = self.publisher.publish(event) {
            tracing::warn!(error = %err, "failed to publish logbook event");
        }
    }

    /// The human-readable name of the book's author.
    pub fn username(&self) -> String {
        self.state.read().author_name.clone()
    }

    /// The id of the author's user log.
    pub fn author_id(&self) -> String {
        self.state.read().author_id.clone()
    }

    /// The author's public key.
    pub fn author_pub_key(&self) -> PublicKey {
        self.secret.public()
    }

    /// The current persisted location of the book.
    pub fn location(&self) -> String {
        self.state.read().location.clone()
    }

    /// Replace the timestamp source. Mainly here so tests control time.
    pub fn set_timestamp_source(&mut self, source: fn() -> i64) {
        self.new_timestamp = source;
    }

    /// Add an operation updating the author's username.
    pub fn write_author_rename(&self, new_name: &str, cancel: &Cancel) -> Result<()> {
        if !is_valid_name(new_name) {
            return Err(Error::InvalidName(new_name.to_string()));
        }
        cancel.check()?;

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let log = state.journal.get_mut(&author_id)?;
        log.append(Op {
            author_id: author_id.clone(),
            name: new_name.to_string(),
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Amend, Model::User)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(log) = state.journal.get_mut(&author_id) {
                log.ops.pop();
            }
            return Err(err);
        }
        state.author_name = new_name.to_string();
        Ok(())
    }

    /// Initialize a new dataset name within the author's namespace,
    /// creating the dataset log and its "main" branch log. A name that
    /// collides with a stranded reference (a log holding only init ops)
    /// removes the stranded log first; any other collision fails.
    pub fn write_dataset_init(&self, ds_name: &str, cancel: &Cancel) -> Result<String> {
        if !is_valid_name(ds_name) {
            return Err(Error::InvalidName(ds_name.to_string()));
        }
        cancel.check()?;

        let mut state = self.state.write();
        let username = state.author_name.clone();
        let author_id = state.author_id.clone();

        let stranded = match state.journal.head_ref(&[username.as_str(), ds_name]) {
            Ok(existing) => {
                let stranded = existing.ops.len() == 1
                    && existing.logs.len() == 1
                    && existing.logs[0].ops.len() == 1;
                if !stranded {
                    return Err(Error::AlreadyExists(ds_name.to_string()));
                }
                true
            }
            Err(_) => false,
        };
        if stranded {
            tracing::debug!(username = %username, name = %ds_name, "removing stranded reference");
            state.journal.remove_log(&[username.as_str(), ds_name])?;
        }

        let profile_id = state.journal.get(&author_id)?.author().to_string();

        tracing::debug!(name = %ds_name, "initializing dataset");
        let mut ds_log = Log::init(Op {
            author_id: author_id.clone(),
            name: ds_name.to_string(),
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Init, Model::Dataset)
        });
        let branch = Log::init(Op {
            author_id: author_id.clone(),
            name: DEFAULT_BRANCH_NAME.to_string(),
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Init, Model::Branch)
        });
        ds_log.add_child(branch);
        let init_id = ds_log.id();

        state.journal.get_mut(&author_id)?.add_child(ds_log);

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(user) = state.journal.get_mut(&author_id) {
                user.logs.retain(|l| l.id() != init_id);
            }
            return Err(err);
        }
        drop(state);

        self.publish(Event::DatasetNameInit(DsChange {
            init_id: init_id.clone(),
            username,
            profile_id,
            pretty_name: ds_name.to_string(),
            ..DsChange::default()
        }));

        Ok(init_id)
    }

    /// Mark a dataset renamed.
    pub fn write_dataset_rename(&self, init_id: &str, new_name: &str, cancel: &Cancel) -> Result<()> {
        if !is_valid_name(new_name) {
            return Err(Error::InvalidName(new_name.to_string()));
        }
        cancel.check()?;
        tracing::debug!(init_id = %init_id, new_name = %new_name, "renaming dataset");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let ds_log = state.journal.get_mut(init_id)?;
        has_write_access(&author_id, ds_log)?;

        ds_log.append(Op {
            name: new_name.to_string(),
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Amend, Model::Dataset)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(ds_log) = state.journal.get_mut(init_id) {
                ds_log.ops.pop();
            }
            return Err(err);
        }
        drop(state);

        self.publish(Event::DatasetRename(DsChange {
            init_id: init_id.to_string(),
            pretty_name: new_name.to_string(),
            ..DsChange::default()
        }));
        Ok(())
    }

    /// Close a dataset, marking it deleted. The log itself persists;
    /// removal is an operation, not an erasure.
    pub fn write_dataset_delete(&self, init_id: &str, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        tracing::debug!(init_id = %init_id, "deleting dataset");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let ds_log = state.journal.get_mut(init_id)?;
        has_write_access(&author_id, ds_log)?;

        ds_log.append(Op {
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Remove, Model::Dataset)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(ds_log) = state.journal.get_mut(init_id) {
                ds_log.ops.pop();
            }
            return Err(err);
        }
        drop(state);

        self.publish(Event::DatasetDeleteAll(DsChange {
            init_id: init_id.to_string(),
            ..DsChange::default()
        }));
        Ok(())
    }

    /// Record the creation of a dataset version: one commit op, preceded
    /// by a run op when `run_state` is given. With a run state, the
    /// dataset commit's run id must match the run's id.
    pub fn write_version_save(
        &self,
        init_id: &str,
        ds: &Dataset,
        run_state: Option<&RunState>,
        cancel: &Cancel,
    ) -> Result<()> {
        cancel.check()?;
        tracing::debug!(init_id = %init_id, "writing version save");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let branch = branch_log_mut(&mut state.journal, init_id)?;
        has_write_access(&author_id, branch)?;

        if let Some(rs) = run_state {
            if rs.id != ds.commit.run_id {
                return Err(Error::RunIdMismatch);
            }
        }

        let prev_len = branch.ops.len();
        if let Some(rs) = run_state {
            branch.append(transform_run_op(rs))?;
        }
        branch.append(version_save_op(ds))?;
        let top_index = (branch.ops.len() - 1) as i64;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                branch.ops.truncate(prev_len);
            }
            return Err(err);
        }
        drop(state);

        self.publish(Event::DatasetCommitChange(DsChange {
            init_id: init_id.to_string(),
            top_index,
            head_ref: ds.path.clone(),
            info: Some(version_info_from_dataset(ds)),
            ..DsChange::default()
        }));
        Ok(())
    }

    /// Amend the head commit, replacing it in derived history.
    pub fn write_version_amend(&self, init_id: &str, ds: &Dataset, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        tracing::debug!(init_id = %init_id, "amending version");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let branch = branch_log_mut(&mut state.journal, init_id)?;
        has_write_access(&author_id, branch)?;

        branch.append(Op {
            reference: ds.path.clone(),
            prev: ds.previous_path.clone(),
            timestamp: ds.commit.timestamp,
            note: ds.commit.title.clone(),
            ..Op::new(OpType::Amend, Model::Commit)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                branch.ops.pop();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Tombstone a number of sequential versions from head. Because logs
    /// are append-only, deletes are recorded as remove ops that mark
    /// revisions logically deleted during derivation.
    pub fn write_version_delete(&self, init_id: &str, revisions: i64, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        tracing::debug!(init_id = %init_id, revisions, "writing version delete");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let branch = branch_log_mut(&mut state.journal, init_id)?;
        has_write_access(&author_id, branch)?;

        branch.append(Op {
            size: revisions,
            timestamp: (self.new_timestamp)(),
            ..Op::new(OpType::Remove, Model::Commit)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                branch.ops.pop();
            }
            return Err(err);
        }

        // report the head after collapsing only tail-of-history deletes
        let branch = branch_log(&state.journal, init_id)?;
        let items = branch_to_version_infos(branch, &Ref::default(), 0, None, false);
        drop(state);

        if let Some(newest) = items.first() {
            self.publish(Event::DatasetCommitChange(DsChange {
                init_id: init_id.to_string(),
                top_index: items.len() as i64,
                head_ref: newest.path.clone(),
                info: Some(newest.clone()),
                ..DsChange::default()
            }));
        }
        Ok(())
    }

    /// Record publication of `revisions` versions to a remote. Returns
    /// the sparse user/dataset/branches log for transport, plus an
    /// idempotent rollback that strips the push op.
    pub fn write_remote_push(
        &self,
        init_id: &str,
        revisions: i64,
        remote_addr: &str,
        cancel: &Cancel,
    ) -> Result<(Log, PushRollback<'_>)> {
        tracing::debug!(init_id = %init_id, revisions, remote = %remote_addr, "writing remote push");
        self.write_push_op(init_id, OpType::Init, revisions, remote_addr, cancel)
    }

    /// Record an unpublish request for `revisions` versions on a remote.
    /// Returns transport log and rollback like [`Book::write_remote_push`].
    pub fn write_remote_delete(
        &self,
        init_id: &str,
        revisions: i64,
        remote_addr: &str,
        cancel: &Cancel,
    ) -> Result<(Log, PushRollback<'_>)> {
        tracing::debug!(init_id = %init_id, revisions, remote = %remote_addr, "writing remote delete");
        self.write_push_op(init_id, OpType::Remove, revisions, remote_addr, cancel)
    }

    fn write_push_op(
        &self,
        init_id: &str,
        kind: OpType,
        revisions: i64,
        remote_addr: &str,
        cancel: &Cancel,
    ) -> Result<(Log, PushRollback<'_>)> {
        cancel.check()?;

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let branch = branch_log_mut(&mut state.journal, init_id)?;
        has_write_access(&author_id, branch)?;

        branch.append(Op {
            timestamp: (self.new_timestamp)(),
            size: revisions,
            relations: vec![remote_addr.to_string()],
            ..Op::new(kind, Model::Push)
        })?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                branch.ops.pop();
            }
            return Err(err);
        }

        let sparse = match state.journal.get_with_sparse_ancestors_all_descendants(init_id) {
            Ok(log) => log,
            Err(err) => {
                // undo the push op we just persisted
                if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                    branch.ops.pop();
                }
                let _ = self.save_locked(&mut state, cancel);
                return Err(err.into());
            }
        };
        drop(state);

        Ok((sparse, PushRollback::new(self, init_id)))
    }

    /// Record the execution of a transform script with no accompanying
    /// commit.
    pub fn write_transform_run(&self, init_id: &str, rs: &RunState, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        tracing::debug!(init_id = %init_id, run_id = %rs.id, "writing transform run");

        let mut state = self.state.write();
        let author_id = state.author_id.clone();
        let branch = branch_log_mut(&mut state.journal, init_id)?;
        has_write_access(&author_id, branch)?;

        branch.append(transform_run_op(rs))?;

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, init_id) {
                branch.ops.pop();
            }
            return Err(err);
        }
        Ok(())
    }

    /// Merge a foreign log into the book, verifying it against the
    /// sender's public key first. For now only logs written by the sender
    /// merge; access control beyond that is future work.
    pub fn merge_log(&self, sender: &PublicKey, log: &Log, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        log.verify(sender)?;

        let mut state = self.state.write();
        let snapshot = state.journal.clone();
        if let Err(err) = state.journal.merge_log(log.clone()) {
            state.journal = snapshot;
            return Err(err.into());
        }
        if let Err(err) = self.save_locked(&mut state, cancel) {
            state.journal = snapshot;
            return Err(err);
        }
        Ok(())
    }

    /// Physically remove a log. Used for stranded references and local
    /// cleanup; distinct from writing a remove op.
    pub fn remove_log(&self, r: &Ref, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        let mut state = self.state.write();
        let snapshot = state.journal.clone();
        state
            .journal
            .remove_log(&[r.username.as_str(), r.name.as_str()])?;
        if let Err(err) = self.save_locked(&mut state, cancel) {
            state.journal = snapshot;
            return Err(err);
        }
        Ok(())
    }

    /// Bootstrap a sparse history for a dataset this book holds no log
    /// for. The history must be ordered oldest to newest. Refuses to
    /// overwrite an existing log, which is as-or-more rich than any
    /// reconstruction.
    pub fn construct_dataset_log(
        &self,
        r: &Ref,
        history: &[Dataset],
        cancel: &Cancel,
    ) -> Result<String> {
        cancel.check()?;
        if self.ref_to_init_id(r).is_ok() {
            return Err(Error::LogTooShort);
        }

        let init_id = self.write_dataset_init(&r.name, cancel)?;

        let mut state = self.state.write();
        let branch = branch_log_mut(&mut state.journal, &init_id)?;
        let prev_len = branch.ops.len();
        for ds in history {
            branch.append(version_save_op(ds))?;
        }

        if let Err(err) = self.save_locked(&mut state, cancel) {
            if let Ok(branch) = branch_log_mut(&mut state.journal, &init_id) {
                branch.ops.truncate(prev_len);
            }
            return Err(err);
        }
        Ok(init_id)
    }

    /// Convert a username/name reference into an init id.
    pub fn ref_to_init_id(&self, r: &Ref) -> Result<String> {
        let state = self.state.read();
        let ds_log = state
            .journal
            .head_ref(&[r.username.as_str(), r.name.as_str()])
            .map_err(|_| Error::NotFound)?;
        Ok(ds_log.id())
    }

    /// Populate the missing fields of a reference from the logbook: the
    /// init id, then the head path and owning profile id when empty.
    /// The returned string is the multiaddr of the resolving peer; a
    /// local resolver has none.
    pub fn resolve_ref(&self, r: &mut Ref) -> Result<String> {
        let state = self.state.read();
        let init_id = match state
            .journal
            .head_ref(&[r.username.as_str(), r.name.as_str()])
        {
            Ok(ds_log) => ds_log.id(),
            Err(_) => return Err(Error::RefNotFound),
        };
        r.init_id = init_id.clone();

        if r.path.is_empty() {
            let branch = branch_log(&state.journal, &init_id)?;
            tracing::debug!(init_id = %init_id, ops = branch.ops.len(), "found branch log");
            r.path = latest_save_path(branch).to_string();
        }

        if r.profile_id.is_empty() {
            let branch = branch_log(&state.journal, &init_id)?;
            let author_log = state.journal.get(branch.author())?;
            r.profile_id = author_log.author().to_string();
        }

        Ok(String::new())
    }

    /// Collapse the history of a dataset branch into linear version
    /// records, newest first.
    pub fn items(&self, r: &Ref, offset: usize, limit: Option<usize>) -> Result<Vec<VersionInfo>> {
        let state = self.state.read();
        let init_id = state
            .journal
            .head_ref(&[r.username.as_str(), r.name.as_str()])?
            .id();
        let branch = branch_log(&state.journal, &init_id)?;
        Ok(branch_to_version_infos(branch, r, offset, limit, true))
    }

    /// A summarized line-by-line representation of a dataset's branch log.
    pub fn log_entries(&self, r: &Ref, offset: usize, limit: Option<usize>) -> Result<Vec<LogEntry>> {
        let state = self.state.read();
        let branch = state.journal.head_ref(&[
            r.username.as_str(),
            r.name.as_str(),
            DEFAULT_BRANCH_NAME,
        ])?;

        let mut entries = Vec::new();
        for op in branch.ops.iter().skip(offset) {
            entries.push(log_entry_from_op(&r.username, op));
            if limit.is_some_and(|l| entries.len() == l) {
                break;
            }
        }
        Ok(entries)
    }

    /// Every top-level log in the book.
    pub fn list_all_logs(&self) -> Vec<Log> {
        self.state.read().journal.logs().to_vec()
    }

    /// Fetch a log anywhere in the forest by id.
    pub fn log(&self, id: &str) -> Result<Log> {
        Ok(self.state.read().journal.get(id)?.clone())
    }

    /// Plain-old-data representations of all logs, for serialization.
    pub fn plain_logs(&self) -> Vec<PlainLog> {
        self.state
            .read()
            .journal
            .logs()
            .iter()
            .map(PlainLog::from)
            .collect()
    }

    /// The model/id/opcount/name hierarchy in a single diagnostic string.
    pub fn summary_string(&self) -> String {
        let state = self.state.read();
        let mut out = String::new();
        for user in state.journal.logs() {
            let _ = writeln!(
                out,
                "{} {} {} {}",
                user.model().as_str(),
                user.id(),
                user.ops.len(),
                user.name()
            );
            for dataset in &user.logs {
                let _ = writeln!(
                    out,
                    "  {} {} {} {}",
                    dataset.model().as_str(),
                    dataset.id(),
                    dataset.ops.len(),
                    dataset.name()
                );
                for branch in &dataset.logs {
                    let _ = writeln!(
                        out,
                        "    {} {} {} {}",
                        branch.model().as_str(),
                        branch.id(),
                        branch.ops.len(),
                        branch.name()
                    );
                }
            }
        }
        out
    }

    /// Every commit path referenced anywhere in the book, after tombstone
    /// collapse.
    pub fn all_referenced_dataset_paths(&self) -> HashSet<String> {
        let state = self.state.read();
        let mut paths = HashSet::new();
        for log in state.journal.logs() {
            add_referenced_paths(log, &mut paths);
        }
        paths
    }

    /// The author's log reduced to lineage, holding one dataset log with
    /// all its branches. The transport form for push and merge.
    pub fn user_dataset_branches_log(&self, init_id: &str) -> Result<Log> {
        if init_id.is_empty() {
            return Err(Error::NotFound);
        }
        let state = self.state.read();
        Ok(state
            .journal
            .get_with_sparse_ancestors_all_descendants(init_id)?)
    }

    /// Populate a log's signature with the book's private key.
    pub fn sign_log(&self, log: &mut Log) {
        log.sign(&self.secret);
    }

    /// Sign a log and return its canonical bytes, ready for export.
    pub fn log_bytes(&self, log: &mut Log) -> Vec<u8> {
        self.sign_log(log);
        oplog::wire::log_bytes(log)
    }

    /// Replace the contents of the book with the provided log.
    pub fn replace_all(&self, log: Log, cancel: &Cancel) -> Result<()> {
        cancel.check()?;
        let mut state = self.state.write();
        let snapshot = state.journal.clone();
        state.journal.replace_all(log);
        if let Err(err) = self.save_locked(&mut state, cancel) {
            state.journal = snapshot;
            return Err(err);
        }
        Ok(())
    }
}

/// An undo handle for a persisted push op. Calling [`PushRollback::run`]
/// strips the op and persists again; later calls are no-ops.
pub struct PushRollback<'b> {
    book: &'b Book,
    init_id: String,
    done: AtomicBool,
}

impl<'b> PushRollback<'b> {
    fn new(book: &'b Book, init_id: &str) -> Self {
        Self {
            book,
            init_id: init_id.to_string(),
            done: AtomicBool::new(false),
        }
    }

    /// Strip the push op this rollback corresponds to.
    pub fn run(&self, cancel: &Cancel) -> Result<()> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.book.state.write();
        let branch = branch_log_mut(&mut state.journal, &self.init_id)?;
        branch.ops.pop();
        self.book.save_locked(&mut state, cancel)
    }
}

/// Parse an exported log into a dataset alias reference: username, dataset
/// name, and profile id. The log must refer unambiguously to one dataset.
pub fn dsref_alias_for_log(log: &Log) -> Result<Ref> {
    if log.model() != Model::User {
        return Err(Error::Malformed("log isn't rooted as a user".into()));
    }
    if log.logs.len() != 1 {
        return Err(Error::Malformed("ambiguous dataset reference".into()));
    }
    Ok(Ref {
        username: log.name().to_string(),
        name: log.logs[0].name().to_string(),
        profile_id: log.author().to_string(),
        ..Ref::default()
    })
}

fn has_write_access(author_id: &str, log: &Log) -> Result<()> {
    if log.author() != author_id {
        return Err(Error::AccessDenied);
    }
    Ok(())
}

fn branch_log<'a>(journal: &'a Journal, init_id: &str) -> Result<&'a Log> {
    let ds_log = journal.get(init_id)?;
    if ds_log.logs.len() != 1 {
        return Err(Error::Malformed(format!(
            "expected dataset log to have 1 branch, has {}",
            ds_log.logs.len()
        )));
    }
    Ok(&ds_log.logs[0])
}

fn branch_log_mut<'a>(journal: &'a mut Journal, init_id: &str) -> Result<&'a mut Log> {
    let ds_log = journal.get_mut(init_id)?;
    if ds_log.logs.len() != 1 {
        return Err(Error::Malformed(format!(
            "expected dataset log to have 1 branch, has {}",
            ds_log.logs.len()
        )));
    }
    Ok(&mut ds_log.logs[0])
}

fn version_save_op(ds: &Dataset) -> Op {
    let mut op = Op {
        reference: ds.path.clone(),
        prev: ds.previous_path.clone(),
        timestamp: ds.commit.timestamp,
        note: ds.commit.title.clone(),
        ..Op::new(OpType::Init, Model::Commit)
    };
    if let Some(structure) = ds.structure {
        op.size = structure.length;
    }
    if !ds.commit.run_id.is_empty() {
        op.relations = vec![format!("{RUN_ID_REL_PREFIX}{}", ds.commit.run_id)];
    }
    op
}

fn transform_run_op(rs: &RunState) -> Op {
    Op {
        reference: rs.id.clone(),
        name: rs.number.to_string(),
        size: rs.duration,
        note: rs.status.to_string(),
        timestamp: rs.start_time.unwrap_or(0),
        ..Op::new(OpType::Init, Model::Run)
    }
}

fn version_info_from_dataset(ds: &Dataset) -> VersionInfo {
    VersionInfo {
        name: ds.name.clone(),
        path: ds.path.clone(),
        commit_time: (ds.commit.timestamp != 0)
            .then(|| DateTime::from_timestamp_nanos(ds.commit.timestamp)),
        commit_title: ds.commit.title.clone(),
        body_size: ds.structure.map(|s| s.length).unwrap_or(0),
        run_id: ds.commit.run_id.clone(),
        ..VersionInfo::default()
    }
}

fn add_referenced_paths(log: &Log, paths: &mut HashSet<String>) {
    let mut ps: Vec<&str> = Vec::new();
    for op in &log.ops {
        if op.model != Model::Commit {
            continue;
        }
        match op.kind {
            OpType::Init => ps.push(&op.reference),
            OpType::Remove => {
                let count = op.size.max(0) as usize;
                ps.truncate(ps.len().saturating_sub(count));
            }
            OpType::Amend => {
                if let Some(last) = ps.last_mut() {
                    *last = &op.reference;
                }
            }
        }
    }
    for p in ps {
        paths.insert(p.to_string());
    }
    for child in &log.logs {
        add_referenced_paths(child, paths);
    }
}
