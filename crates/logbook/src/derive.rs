//! Pure derivations over branch logs.
//!
//! Everything here is a total function of a log's operations: the current
//! head path after tombstones, the collapsed version list, and
//! line-by-line entry summaries. No derivation result is ever stored.

use chrono::{DateTime, Utc};

use oplog::{Log, Model, Op, OpType};

use crate::refs::{Ref, VersionInfo};

/// Relation prefix tying a commit op to the run that produced it.
pub const RUN_ID_REL_PREFIX: &str = "runID:";

/// The run id relation of a commit op, if present.
pub fn commit_op_run_id(op: &Op) -> Option<&str> {
    op.relations
        .iter()
        .find_map(|rel| rel.strip_prefix(RUN_ID_REL_PREFIX))
}

fn timestamp_to_datetime(ns: i64) -> Option<DateTime<Utc>> {
    if ns == 0 {
        return None;
    }
    Some(DateTime::from_timestamp_nanos(ns))
}

/// The head path of a branch: the ref of the most recent commit that is
/// not consumed by a tombstone. Scans in reverse, spending each remove
/// op's count against the inits and amends beneath it.
pub fn latest_save_path(branch: &Log) -> &str {
    let mut removes: i64 = 0;

    for op in branch.ops.iter().rev() {
        if op.model != Model::Commit {
            continue;
        }
        match op.kind {
            OpType::Remove => removes += op.size,
            OpType::Init | OpType::Amend => {
                if removes > 0 {
                    removes -= 1;
                } else {
                    return &op.reference;
                }
            }
        }
    }
    ""
}

fn version_info_from_op(r: &Ref, op: &Op) -> VersionInfo {
    VersionInfo {
        username: r.username.clone(),
        profile_id: r.profile_id.clone(),
        name: r.name.clone(),
        path: op.reference.clone(),
        commit_time: timestamp_to_datetime(op.timestamp),
        body_size: op.size,
        commit_title: op.note.clone(),
        ..VersionInfo::default()
    }
}

fn run_item_from_op(r: &Ref, op: &Op) -> VersionInfo {
    VersionInfo {
        username: r.username.clone(),
        profile_id: r.profile_id.clone(),
        name: r.name.clone(),
        commit_time: timestamp_to_datetime(op.timestamp),
        run_id: op.reference.clone(),
        run_status: op.note.clone(),
        run_duration: op.size,
        ..VersionInfo::default()
    }
}

fn add_commit_details(info: &mut VersionInfo, op: &Op) {
    info.commit_time = timestamp_to_datetime(op.timestamp);
    info.commit_title = op.note.clone();
    info.body_size = op.size;
    info.path = op.reference.clone();
}

/// Collapse the history of a branch into linear version records, newest
/// first.
///
/// A commit op directly following the run op it references merges into a
/// single record describing both. When `collapse_all_deletes` is false,
/// remove ops found at the tail of history accumulate and apply once at
/// the end instead of eagerly.
pub fn branch_to_version_infos(
    branch: &Log,
    r: &Ref,
    offset: usize,
    limit: Option<usize>,
    collapse_all_deletes: bool,
) -> Vec<VersionInfo> {
    let mut refs: Vec<VersionInfo> = Vec::new();
    let mut delete_at_end: usize = 0;

    for op in &branch.ops {
        match op.model {
            Model::Commit => match op.kind {
                OpType::Init => {
                    let merged = commit_op_run_id(op).is_some_and(|run_id| {
                        refs.last().is_some_and(|last| last.run_id == run_id)
                    });
                    if merged {
                        let last = refs.last_mut().expect("merged implies a prior entry");
                        add_commit_details(last, op);
                    } else {
                        refs.push(version_info_from_op(r, op));
                    }
                }
                OpType::Amend => {
                    delete_at_end = 0;
                    if let Some(last) = refs.last_mut() {
                        *last = version_info_from_op(r, op);
                    }
                }
                OpType::Remove => {
                    let count = op.size.max(0) as usize;
                    if collapse_all_deletes {
                        refs.truncate(refs.len().saturating_sub(count));
                    } else {
                        delete_at_end += count;
                    }
                }
            },
            // runs only ever carry the init op type
            Model::Run => refs.push(run_item_from_op(r, op)),
            Model::Push => {
                let count = (op.size.max(0) as usize).min(refs.len());
                let tail = refs.len() - count;
                match op.kind {
                    OpType::Init => {
                        for item in &mut refs[tail..] {
                            item.published = true;
                        }
                    }
                    OpType::Remove => {
                        for item in &mut refs[tail..] {
                            item.published = false;
                        }
                    }
                    OpType::Amend => {}
                }
            }
            _ => {}
        }
    }

    if delete_at_end > 0 {
        refs.truncate(refs.len().saturating_sub(delete_at_end));
    }

    // newest first
    refs.reverse();

    let offset = offset.min(refs.len());
    refs.drain(..offset);
    if let Some(limit) = limit {
        refs.truncate(limit);
    }
    refs
}

/// A simplified, human-oriented rendering of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the operation was written.
    pub timestamp: DateTime<Utc>,
    /// Username of the log's owner.
    pub author: String,
    /// What the operation did, e.g. "save commit".
    pub action: &'static str,
    /// Operation annotation; falls back to the op name.
    pub note: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.timestamp.format("%-I:%M%p"),
            self.author,
            self.action,
            self.note
        )
    }
}

/// Human action descriptor for a model/type pair.
pub fn action_string(model: Model, kind: OpType) -> &'static str {
    match (model, kind) {
        (Model::User, OpType::Init) => "create profile",
        (Model::User, OpType::Amend) => "update profile",
        (Model::User, OpType::Remove) => "delete profile",
        (Model::Dataset, OpType::Init) => "init dataset",
        (Model::Dataset, OpType::Amend) => "rename dataset",
        (Model::Dataset, OpType::Remove) => "delete dataset",
        (Model::Branch, OpType::Init) => "init branch",
        (Model::Branch, OpType::Amend) => "rename branch",
        (Model::Branch, OpType::Remove) => "delete branch",
        (Model::Commit, OpType::Init) => "save commit",
        (Model::Commit, OpType::Amend) => "amend commit",
        (Model::Commit, OpType::Remove) => "remove commit",
        (Model::Push, OpType::Init) => "publish",
        (Model::Push, OpType::Amend) => "",
        (Model::Push, OpType::Remove) => "unpublish",
        (Model::Run, OpType::Init) => "transform run",
        (Model::Run, OpType::Amend) => "",
        (Model::Run, OpType::Remove) => "",
        (Model::Acl, OpType::Init) => "update access",
        (Model::Acl, OpType::Amend) => "update access",
        (Model::Acl, OpType::Remove) => "remove all access",
    }
}

/// Build a log entry for one operation.
pub fn log_entry_from_op(author: &str, op: &Op) -> LogEntry {
    let note = if op.note.is_empty() && !op.name.is_empty() {
        op.name.clone()
    } else {
        op.note.clone()
    };
    LogEntry {
        timestamp: DateTime::from_timestamp_nanos(op.timestamp),
        author: author.to_string(),
        action: action_string(op.model, op.kind),
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch() -> Log {
        Log::init(Op {
            name: "main".into(),
            author_id: "author".into(),
            timestamp: 1,
            ..Op::new(OpType::Init, Model::Branch)
        })
    }

    fn commit(path: &str, title: &str, ts: i64) -> Op {
        Op {
            reference: path.into(),
            note: title.into(),
            timestamp: ts,
            size: 10,
            ..Op::new(OpType::Init, Model::Commit)
        }
    }

    fn remove_commits(n: i64) -> Op {
        Op {
            size: n,
            ..Op::new(OpType::Remove, Model::Commit)
        }
    }

    fn push(kind: OpType, n: i64, remote: &str) -> Op {
        Op {
            size: n,
            relations: vec![remote.into()],
            ..Op::new(kind, Model::Push)
        }
    }

    fn alias() -> Ref {
        Ref::alias("alice", "movies")
    }

    #[test]
    fn test_head_empty_branch() {
        assert_eq!(latest_save_path(&branch()), "");
    }

    #[test]
    fn test_head_follows_saves() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        assert_eq!(latest_save_path(&b), "/mem/Qa");
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();
        assert_eq!(latest_save_path(&b), "/mem/Qb");
    }

    #[test]
    fn test_head_under_deletes() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();
        b.append(commit("/mem/Qc", "t3", 300)).unwrap();

        b.append(remove_commits(1)).unwrap();
        assert_eq!(latest_save_path(&b), "/mem/Qb");

        b.append(remove_commits(2)).unwrap();
        assert_eq!(latest_save_path(&b), "");
    }

    #[test]
    fn test_head_save_after_delete() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(remove_commits(1)).unwrap();
        b.append(commit("/mem/Qd", "t4", 400)).unwrap();
        assert_eq!(latest_save_path(&b), "/mem/Qd");
    }

    #[test]
    fn test_head_follows_amend() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(Op {
            reference: "/mem/Qa2".into(),
            prev: "/mem/Qa".into(),
            note: "fixed".into(),
            timestamp: 150,
            ..Op::new(OpType::Amend, Model::Commit)
        })
        .unwrap();
        assert_eq!(latest_save_path(&b), "/mem/Qa2");
    }

    #[test]
    fn test_items_newest_first() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "/mem/Qb");
        assert_eq!(items[0].commit_title, "t2");
        assert_eq!(items[1].path, "/mem/Qa");
        assert_eq!(items[1].username, "alice");
    }

    #[test]
    fn test_items_offset_and_limit() {
        let mut b = branch();
        for i in 0..5 {
            b.append(commit(&format!("/mem/Q{i}"), "t", 100 + i)).unwrap();
        }

        let items = branch_to_version_infos(&b, &alias(), 1, Some(2), true);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "/mem/Q3");
        assert_eq!(items[1].path, "/mem/Q2");

        let items = branch_to_version_infos(&b, &alias(), 10, None, true);
        assert!(items.is_empty());
    }

    #[test]
    fn test_items_collapse_deletes() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();
        b.append(remove_commits(1)).unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "/mem/Qa");
    }

    #[test]
    fn test_items_delete_at_end_mode() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(remove_commits(1)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();

        // eager collapse removes Qa, leaving Qb
        let eager = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert_eq!(eager.len(), 1);
        assert_eq!(eager[0].path, "/mem/Qb");

        // tail-only mode keeps mid-history removes pending until the end,
        // so the tombstone lands on the newest entry instead
        let lazy = branch_to_version_infos(&b, &alias(), 0, None, false);
        assert_eq!(lazy.len(), 1);
        assert_eq!(lazy[0].path, "/mem/Qa");
    }

    #[test]
    fn test_items_delete_everything() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(remove_commits(5)).unwrap();
        assert!(branch_to_version_infos(&b, &alias(), 0, None, true).is_empty());
        assert!(branch_to_version_infos(&b, &alias(), 0, None, false).is_empty());
    }

    #[test]
    fn test_items_amend_replaces_and_resets_pending_delete() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(remove_commits(1)).unwrap();
        b.append(Op {
            reference: "/mem/Qa2".into(),
            note: "amended".into(),
            timestamp: 150,
            ..Op::new(OpType::Amend, Model::Commit)
        })
        .unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, false);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "/mem/Qa2");
        assert_eq!(items[0].commit_title, "amended");
    }

    #[test]
    fn test_items_merge_run_and_commit() {
        let mut b = branch();
        b.append(Op {
            reference: "run-1".into(),
            name: "1".into(),
            note: "succeeded".into(),
            timestamp: 90,
            size: 2_000_000,
            ..Op::new(OpType::Init, Model::Run)
        })
        .unwrap();
        let mut save = commit("/mem/Qa", "t1", 100);
        save.relations = vec![format!("{RUN_ID_REL_PREFIX}run-1")];
        b.append(save).unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].run_id, "run-1");
        assert_eq!(items[0].run_status, "succeeded");
        assert_eq!(items[0].run_duration, 2_000_000);
        assert_eq!(items[0].path, "/mem/Qa");
        assert_eq!(items[0].commit_title, "t1");
    }

    #[test]
    fn test_items_unrelated_run_stays_separate() {
        let mut b = branch();
        b.append(Op {
            reference: "run-1".into(),
            note: "failed".into(),
            timestamp: 90,
            ..Op::new(OpType::Init, Model::Run)
        })
        .unwrap();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "/mem/Qa");
        assert_eq!(items[1].run_id, "run-1");
        assert!(items[1].path.is_empty());
    }

    #[test]
    fn test_publish_toggling() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();

        b.append(push(OpType::Init, 2, "/ip4/1.2.3.4")).unwrap();
        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert!(items.iter().all(|i| i.published));

        b.append(push(OpType::Remove, 2, "/ip4/1.2.3.4")).unwrap();
        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        assert!(items.iter().all(|i| !i.published));
    }

    #[test]
    fn test_publish_partial() {
        let mut b = branch();
        b.append(commit("/mem/Qa", "t1", 100)).unwrap();
        b.append(commit("/mem/Qb", "t2", 200)).unwrap();
        b.append(push(OpType::Init, 1, "/ip4/1.2.3.4")).unwrap();

        let items = branch_to_version_infos(&b, &alias(), 0, None, true);
        // newest first: Qb was the last save, so it is the published one
        assert!(items[0].published);
        assert!(!items[1].published);
    }

    #[test]
    fn test_log_entry_rendering() {
        let op = Op {
            note: "initial commit".into(),
            timestamp: 1_600_000_000_000_000_000,
            ..Op::new(OpType::Init, Model::Commit)
        };
        let entry = log_entry_from_op("alice", &op);
        assert_eq!(entry.action, "save commit");
        let rendered = entry.to_string();
        assert!(rendered.contains("alice"));
        assert!(rendered.contains("initial commit"));
    }

    #[test]
    fn test_log_entry_falls_back_to_name() {
        let op = Op {
            name: "movies".into(),
            ..Op::new(OpType::Init, Model::Dataset)
        };
        assert_eq!(log_entry_from_op("alice", &op).note, "movies");
    }
}
