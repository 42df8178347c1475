//! Content-addressed object store abstraction.
//!
//! The snapshot builder only talks to [`ObjectStore`]; [`GitStore`] is the
//! gix-backed implementation used at runtime.

mod gix_store;

use std::collections::BTreeMap;

use chrono::{DateTime, Offset, TimeZone};
pub use gix::ObjectId;

pub use gix_store::GitStore;

use crate::error::SnapshotError;

/// Name, email and timestamp recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in seconds, east positive.
    pub offset: i32,
}

impl Signature {
    /// Creates a signature stamped with the given local time.
    pub fn at<Tz: TimeZone>(
        name: impl Into<String>,
        email: impl Into<String>,
        time: &DateTime<Tz>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            seconds: time.timestamp(),
            offset: time.offset().fix().local_minus_utc(),
        }
    }
}

/// Storage for blobs, trees and commits plus a single branch reference.
///
/// Paths handed to [`create_tree`](ObjectStore::create_tree) are relative,
/// `/`-separated, and already unique; the store builds any intermediate
/// directory trees.
pub trait ObjectStore {
    /// Stores `data` as a blob and returns its id.
    fn create_blob(&mut self, data: &[u8]) -> Result<ObjectId, SnapshotError>;

    /// Stores the directory hierarchy described by `entries` and returns
    /// the id of the root tree.
    fn create_tree(&mut self, entries: &BTreeMap<String, ObjectId>) -> Result<ObjectId, SnapshotError>;

    /// Stores a commit object. The branch reference is not touched.
    fn create_commit(
        &mut self,
        tree: ObjectId,
        parents: &[ObjectId],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<ObjectId, SnapshotError>;

    /// Returns the commit the snapshot branch points at, if any.
    fn head_commit(&self) -> Result<Option<ObjectId>, SnapshotError>;

    /// Returns the root tree of `commit`.
    fn tree_of(&self, commit: ObjectId) -> Result<ObjectId, SnapshotError>;

    /// Moves the snapshot branch to `commit`.
    ///
    /// The update only succeeds if the branch still points at `expected`
    /// (or does not exist when `expected` is `None`).
    fn update_branch_ref(
        &mut self,
        commit: ObjectId,
        expected: Option<ObjectId>,
        message: &str,
    ) -> Result<(), SnapshotError>;

    /// Name of the branch snapshots are committed to.
    fn head_branch(&self) -> &str;

    /// Brings any staging area in line with `tree` after a commit.
    fn sync_index(&mut self, _tree: ObjectId) -> Result<(), SnapshotError> {
        Ok(())
    }
}
