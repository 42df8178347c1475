//! Blob, tree and commit assembly.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::store::{ObjectId, ObjectStore, Signature};

/// Formats the commit message for a snapshot taken at `time`.
pub fn commit_message<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Backup {}", time.format("%Y-%m-%d %H:%M:%S"))
}

/// Everything needed to record a snapshot commit.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    /// Commit even when the tree equals the current head's tree.
    pub force: bool,
}

impl CommitRequest {
    /// Builds a request stamped with the current local time, using the
    /// same identity for author and committer.
    pub fn now(name: &str, email: &str, force: bool) -> Self {
        let now = chrono::Local::now();
        let signature = Signature::at(name, email, &now);
        Self {
            author: signature.clone(),
            committer: signature,
            message: commit_message(&now),
            force,
        }
    }
}

/// Outcome of finishing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CommitResult {
    /// A new commit was created and the branch moved to it.
    #[serde(rename_all = "camelCase")]
    Committed {
        #[serde(serialize_with = "oid::serialize")]
        commit: ObjectId,
        #[serde(serialize_with = "oid::serialize")]
        tree: ObjectId,
        #[serde(serialize_with = "oid::serialize_opt")]
        parent: Option<ObjectId>,
        files: usize,
    },
    /// The tree matched the current head; nothing was committed.
    #[serde(rename_all = "camelCase")]
    NoChanges {
        #[serde(serialize_with = "oid::serialize")]
        head: ObjectId,
        files: usize,
    },
    /// Nothing was written.
    #[serde(rename_all = "camelCase")]
    DryRun { files: usize, bytes: u64 },
}

impl CommitResult {
    /// Id of the commit created by this run, if any.
    pub fn commit_id(&self) -> Option<ObjectId> {
        match self {
            Self::Committed { commit, .. } => Some(*commit),
            _ => None,
        }
    }

    /// Number of files in the snapshot.
    pub fn files(&self) -> usize {
        match self {
            Self::Committed { files, .. } | Self::NoChanges { files, .. } | Self::DryRun { files, .. } => *files,
        }
    }
}

mod oid {
    use serde::Serializer;

    use crate::store::ObjectId;

    pub fn serialize<S: Serializer>(id: &ObjectId, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub fn serialize_opt<S: Serializer>(id: &Option<ObjectId>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.collect_str(id),
            None => s.serialize_none(),
        }
    }
}

/// Accumulates path to blob mappings and commits them as one snapshot.
pub struct SnapshotBuilder<'s, S: ObjectStore + ?Sized> {
    store: &'s mut S,
    entries: BTreeMap<String, ObjectId>,
}

impl<'s, S: ObjectStore + ?Sized> SnapshotBuilder<'s, S> {
    /// Creates an empty builder writing into `store`.
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            entries: BTreeMap::new(),
        }
    }

    /// Stores `content` as a blob under `path`.
    ///
    /// A later call with the same path replaces the earlier entry.
    pub fn add_file(&mut self, path: &str, content: &[u8]) -> Result<ObjectId, SnapshotError> {
        let oid = self.store.create_blob(content)?;
        self.entries.insert(path.to_string(), oid);
        Ok(oid)
    }

    /// Returns true if `path` already has an entry.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries collected so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the tree and, unless it equals the head's tree, a commit on
    /// top of the current head.
    ///
    /// The branch only moves after the commit object exists, and only if it
    /// still points at the head read here.
    pub fn finish(self, request: &CommitRequest) -> Result<CommitResult, SnapshotError> {
        let files = self.entries.len();
        let tree = self.store.create_tree(&self.entries)?;
        let head = self.store.head_commit()?;

        if let Some(head) = head {
            let head_tree = self.store.tree_of(head)?;
            if head_tree == tree && !request.force {
                info!("Snapshot tree {} matches {}, nothing to commit", tree, head);
                return Ok(CommitResult::NoChanges { head, files });
            }
        }

        let commit = self.store.create_commit(
            tree,
            head.as_slice(),
            &request.author,
            &request.committer,
            &request.message,
        )?;
        self.store.update_branch_ref(commit, head, &request.message)?;

        debug!("Committed tree {} as {} ({} files)", tree, commit, files);
        info!(
            "Created snapshot {} on {}",
            commit,
            self.store.head_branch()
        );

        Ok(CommitResult::Committed {
            commit,
            tree,
            parent: head,
            files,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::hash::{DefaultHasher, Hash, Hasher};

    use chrono::FixedOffset;

    use super::*;

    /// Object store kept in memory.
    #[derive(Default)]
    pub(crate) struct MemStore {
        pub blobs: HashMap<ObjectId, Vec<u8>>,
        pub trees: HashMap<ObjectId, BTreeMap<String, ObjectId>>,
        pub commits: HashMap<ObjectId, (ObjectId, Vec<ObjectId>, String)>,
        pub head: Option<ObjectId>,
        pub fail_blob: Option<Vec<u8>>,
    }

    fn hash(kind: &str, data: &[u8]) -> ObjectId {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        data.hash(&mut hasher);
        let low = hasher.finish() as u128;
        data.len().hash(&mut hasher);
        let high = hasher.finish() as u128;
        ObjectId::from_hex(format!("{:040x}", (high << 64) | low).as_bytes()).unwrap()
    }

    impl ObjectStore for MemStore {
        fn create_blob(&mut self, data: &[u8]) -> Result<ObjectId, SnapshotError> {
            if self.fail_blob.as_deref() == Some(data) {
                return Err(SnapshotError::store("disk full"));
            }
            let id = hash("blob", data);
            self.blobs.insert(id, data.to_vec());
            Ok(id)
        }

        fn create_tree(&mut self, entries: &BTreeMap<String, ObjectId>) -> Result<ObjectId, SnapshotError> {
            let serialized: Vec<u8> = entries
                .iter()
                .flat_map(|(k, v)| format!("{}={}\n", k, v).into_bytes())
                .collect();
            let id = hash("tree", &serialized);
            self.trees.insert(id, entries.clone());
            Ok(id)
        }

        fn create_commit(
            &mut self,
            tree: ObjectId,
            parents: &[ObjectId],
            _author: &Signature,
            _committer: &Signature,
            message: &str,
        ) -> Result<ObjectId, SnapshotError> {
            let serialized = format!("{} {:?} {} {}", tree, parents, message, self.commits.len());
            let id = hash("commit", serialized.as_bytes());
            self.commits.insert(id, (tree, parents.to_vec(), message.to_string()));
            Ok(id)
        }

        fn head_commit(&self) -> Result<Option<ObjectId>, SnapshotError> {
            Ok(self.head)
        }

        fn tree_of(&self, commit: ObjectId) -> Result<ObjectId, SnapshotError> {
            self.commits
                .get(&commit)
                .map(|(tree, _, _)| *tree)
                .ok_or_else(|| SnapshotError::store("missing commit"))
        }

        fn update_branch_ref(
            &mut self,
            commit: ObjectId,
            expected: Option<ObjectId>,
            _message: &str,
        ) -> Result<(), SnapshotError> {
            if self.head != expected {
                return Err(SnapshotError::store("reference moved"));
            }
            self.head = Some(commit);
            Ok(())
        }

        fn head_branch(&self) -> &str {
            "main"
        }
    }

    pub(crate) fn request(force: bool) -> CommitRequest {
        let signature = Signature {
            name: "Backup Bot".into(),
            email: "backup@example.com".into(),
            seconds: 1_700_000_000,
            offset: 0,
        };
        CommitRequest {
            author: signature.clone(),
            committer: signature,
            message: "Backup 2023-11-14 22:13:20".into(),
            force,
        }
    }

    #[test]
    fn test_commit_message_format() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let time = tz.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(commit_message(&time), "Backup 2024-03-09 07:05:01");
    }

    #[test]
    fn test_first_commit_is_root() {
        let mut store = MemStore::default();
        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"hello").unwrap();

        let result = builder.finish(&request(false)).unwrap();
        let CommitResult::Committed { commit, parent, files, .. } = result else {
            panic!("expected a commit, got {:?}", result);
        };

        assert_eq!(parent, None);
        assert_eq!(files, 1);
        assert_eq!(store.head, Some(commit));
        assert!(store.commits[&commit].1.is_empty());
    }

    #[test]
    fn test_unchanged_tree_is_not_committed() {
        let mut store = MemStore::default();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"hello").unwrap();
        let first = builder.finish(&request(false)).unwrap().commit_id().unwrap();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"hello").unwrap();
        let second = builder.finish(&request(false)).unwrap();

        assert_eq!(second, CommitResult::NoChanges { head: first, files: 1 });
        assert_eq!(store.commits.len(), 1);
    }

    #[test]
    fn test_force_commits_identical_tree() {
        let mut store = MemStore::default();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"hello").unwrap();
        let first = builder.finish(&request(false)).unwrap().commit_id().unwrap();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"hello").unwrap();
        let result = builder.finish(&request(true)).unwrap();

        let CommitResult::Committed { parent, .. } = result else {
            panic!("expected a commit");
        };
        assert_eq!(parent, Some(first));
        assert_eq!(store.commits.len(), 2);
    }

    #[test]
    fn test_changed_content_has_single_parent() {
        let mut store = MemStore::default();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"v1").unwrap();
        let first = builder.finish(&request(false)).unwrap().commit_id().unwrap();

        let mut builder = SnapshotBuilder::new(&mut store);
        builder.add_file("a.txt", b"v2").unwrap();
        let second = builder.finish(&request(false)).unwrap().commit_id().unwrap();

        assert_eq!(store.commits[&second].1, vec![first]);
    }

    #[test]
    fn test_blob_failure_surfaces_to_caller() {
        let mut store = MemStore {
            fail_blob: Some(b"bad".to_vec()),
            ..Default::default()
        };
        let mut builder = SnapshotBuilder::new(&mut store);

        assert!(builder.add_file("bad.txt", b"bad").is_err());
        builder.add_file("good.txt", b"good").unwrap();
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_commit_result_json() {
        let result = CommitResult::DryRun { files: 3, bytes: 42 };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "dryRun");
        assert_eq!(json["files"], 3);
    }
}
