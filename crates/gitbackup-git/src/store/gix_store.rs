//! [`ObjectStore`] implementation on top of gix.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gix::bstr::ByteSlice;
use gix::objs::tree::{Entry, EntryKind};
use gix::refs::Target;
use gix::refs::transaction::PreviousValue;
use tracing::{debug, info, warn};

use super::{ObjectId, ObjectStore, Signature};
use crate::error::SnapshotError;

/// A git repository used as the snapshot store.
///
/// All access happens on the thread that opened it.
pub struct GitStore {
    repo: gix::Repository,
    branch: String,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("git_dir", &self.repo.git_dir())
            .field("branch", &self.branch)
            .finish()
    }
}

impl GitStore {
    /// Returns true if `path` holds a repository gix can open.
    pub fn is_valid(path: &Path) -> bool {
        gix::open(path).is_ok()
    }

    /// Opens an existing repository.
    ///
    /// Snapshots go to the branch HEAD names; `default_branch` is used
    /// when HEAD is detached.
    pub fn open(path: &Path, default_branch: &str, identity: (&str, &str)) -> Result<Self, SnapshotError> {
        let repo = gix::open_opts(path, open_options(identity))
            .map_err(|e| SnapshotError::store(format!("Failed to open repository at {:?}: {}", path, e)))?;

        let branch = match repo.head_name() {
            Ok(Some(name)) => name.shorten().to_str_lossy().into_owned(),
            Ok(None) => default_branch.to_string(),
            Err(e) => {
                warn!("Could not resolve HEAD in {:?}: {}", path, e);
                default_branch.to_string()
            },
        };

        debug!("Opened snapshot store at {:?} on branch {}", path, branch);
        Ok(Self { repo, branch })
    }

    /// Creates a new repository at `path` whose HEAD names `branch`.
    pub fn init(
        path: &Path,
        bare: bool,
        branch: &str,
        identity: (&str, &str),
    ) -> Result<Self, SnapshotError> {
        std::fs::create_dir_all(path)?;

        let repo = if bare { gix::init_bare(path) } else { gix::init(path) }
            .map_err(|e| SnapshotError::store(format!("Failed to initialize repository at {:?}: {}", path, e)))?;

        let head = repo.git_dir().join("HEAD");
        std::fs::write(&head, format!("ref: refs/heads/{}\n", branch))?;

        info!(
            "Initialized {} snapshot store at {:?}",
            if bare { "bare" } else { "working copy" },
            path
        );

        Self::open(path, branch, identity)
    }

    /// Opens the repository at `path`, creating it if needed.
    pub fn open_or_init(
        path: &Path,
        bare: bool,
        branch: &str,
        identity: (&str, &str),
    ) -> Result<Self, SnapshotError> {
        if Self::is_valid(path) {
            Self::open(path, branch, identity)
        } else {
            Self::init(path, bare, branch, identity)
        }
    }

    /// Returns true if the repository has no working tree.
    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// Root of the working tree, if the repository has one.
    pub fn workdir(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    /// Returns the parent commits of `commit`.
    pub fn parents_of(&self, commit: ObjectId) -> Result<Vec<ObjectId>, SnapshotError> {
        let commit = self
            .repo
            .find_commit(commit)
            .map_err(|e| SnapshotError::store(format!("Failed to find commit {}: {}", commit, e)))?;
        Ok(commit.parent_ids().map(|id| id.detach()).collect())
    }

    /// Returns the commit message of `commit`.
    pub fn message_of(&self, commit: ObjectId) -> Result<String, SnapshotError> {
        let commit = self
            .repo
            .find_commit(commit)
            .map_err(|e| SnapshotError::store(format!("Failed to find commit {}: {}", commit, e)))?;
        let message = commit
            .message_raw()
            .map_err(|e| SnapshotError::store(format!("Failed to decode commit: {}", e)))?;
        Ok(message.to_str_lossy().trim_end().to_string())
    }

    /// Reads every file of `tree` into memory, keyed by relative path.
    pub fn read_tree(&self, tree: ObjectId) -> Result<BTreeMap<String, Vec<u8>>, SnapshotError> {
        let mut files = BTreeMap::new();
        self.collect_tree(tree, "", &mut files)?;
        Ok(files)
    }

    fn collect_tree(
        &self,
        tree: ObjectId,
        prefix: &str,
        out: &mut BTreeMap<String, Vec<u8>>,
    ) -> Result<(), SnapshotError> {
        let tree = self
            .repo
            .find_tree(tree)
            .map_err(|e| SnapshotError::store(format!("Failed to find tree {}: {}", tree, e)))?;
        let entries: Vec<(String, bool, ObjectId)> = tree
            .decode()
            .map_err(|e| SnapshotError::store(format!("Failed to decode tree: {}", e)))?
            .entries
            .iter()
            .map(|e| (e.filename.to_str_lossy().into_owned(), e.mode.is_tree(), e.oid.to_owned()))
            .collect();

        for (name, is_tree, oid) in entries {
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            if is_tree {
                self.collect_tree(oid, &path, out)?;
            } else {
                let blob = self
                    .repo
                    .find_blob(oid)
                    .map_err(|e| SnapshotError::store(format!("Failed to find blob {}: {}", oid, e)))?;
                out.insert(path, blob.data.clone());
            }
        }

        Ok(())
    }

    fn write_dir(&self, dir: &DirNode) -> Result<ObjectId, SnapshotError> {
        let mut entries = Vec::with_capacity(dir.files.len() + dir.dirs.len());

        for (name, child) in &dir.dirs {
            let oid = self.write_dir(child)?;
            entries.push(Entry {
                mode: EntryKind::Tree.into(),
                filename: name.as_str().into(),
                oid,
            });
        }
        for (name, oid) in &dir.files {
            if dir.dirs.contains_key(name) {
                warn!("Skipping file {} that collides with a directory", name);
                continue;
            }
            entries.push(Entry {
                mode: EntryKind::Blob.into(),
                filename: name.as_str().into(),
                oid: *oid,
            });
        }

        entries.sort_by(git_tree_order);

        self.repo
            .write_object(gix::objs::Tree { entries })
            .map(|id| id.detach())
            .map_err(|e| SnapshotError::store(format!("Failed to write tree: {}", e)))
    }
}

/// Open options that pin the committer used for reflog entries.
fn open_options((name, email): (&str, &str)) -> gix::open::Options {
    gix::open::Options::default().config_overrides([
        format!("committer.name={}", name),
        format!("committer.email={}", email),
    ])
}

/// Git sorts tree entries bytewise, with directory names compared as if
/// they ended in `/`.
fn git_tree_order(a: &Entry, b: &Entry) -> Ordering {
    fn key(entry: &Entry) -> Vec<u8> {
        let mut key = entry.filename.to_vec();
        if entry.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
    key(a).cmp(&key(b))
}

/// One directory level while turning flat paths into nested trees.
#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, ObjectId>,
    dirs: BTreeMap<String, DirNode>,
}

impl DirNode {
    fn insert(&mut self, path: &str, oid: ObjectId) {
        match path.split_once('/') {
            Some((dir, rest)) => self.dirs.entry(dir.to_string()).or_default().insert(rest, oid),
            None => {
                self.files.insert(path.to_string(), oid);
            },
        }
    }
}

impl ObjectStore for GitStore {
    fn create_blob(&mut self, data: &[u8]) -> Result<ObjectId, SnapshotError> {
        self.repo
            .write_blob(data)
            .map(|id| id.detach())
            .map_err(|e| SnapshotError::store(format!("Failed to write blob: {}", e)))
    }

    fn create_tree(&mut self, entries: &BTreeMap<String, ObjectId>) -> Result<ObjectId, SnapshotError> {
        let mut root = DirNode::default();
        for (path, oid) in entries {
            let path = path.trim_matches('/');
            if path.is_empty() || path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
                warn!("Skipping invalid tree path {:?}", path);
                continue;
            }
            root.insert(path, *oid);
        }
        self.write_dir(&root)
    }

    fn create_commit(
        &mut self,
        tree: ObjectId,
        parents: &[ObjectId],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<ObjectId, SnapshotError> {
        let commit = gix::objs::Commit {
            tree,
            parents: parents.iter().copied().collect(),
            author: to_actor(author),
            committer: to_actor(committer),
            encoding: None,
            message: format!("{}\n", message.trim_end()).into(),
            extra_headers: Vec::new(),
        };

        self.repo
            .write_object(commit)
            .map(|id| id.detach())
            .map_err(|e| SnapshotError::store(format!("Failed to write commit: {}", e)))
    }

    fn head_commit(&self) -> Result<Option<ObjectId>, SnapshotError> {
        let name = format!("refs/heads/{}", self.branch);
        let reference = self
            .repo
            .try_find_reference(name.as_str())
            .map_err(|e| SnapshotError::store(format!("Failed to read {}: {}", name, e)))?;

        match reference {
            Some(reference) => reference
                .into_fully_peeled_id()
                .map(|id| Some(id.detach()))
                .map_err(|e| SnapshotError::store(format!("Failed to resolve {}: {}", name, e))),
            None => Ok(None),
        }
    }

    fn tree_of(&self, commit: ObjectId) -> Result<ObjectId, SnapshotError> {
        self.repo
            .find_commit(commit)
            .map_err(|e| SnapshotError::store(format!("Failed to find commit {}: {}", commit, e)))?
            .tree_id()
            .map(|id| id.detach())
            .map_err(|e| SnapshotError::store(format!("Failed to read tree of {}: {}", commit, e)))
    }

    fn update_branch_ref(
        &mut self,
        commit: ObjectId,
        expected: Option<ObjectId>,
        message: &str,
    ) -> Result<(), SnapshotError> {
        let name = format!("refs/heads/{}", self.branch);
        let constraint = match expected {
            Some(previous) => PreviousValue::MustExistAndMatch(Target::Object(previous)),
            None => PreviousValue::MustNotExist,
        };

        self.repo
            .reference(name.as_str(), commit, constraint, format!("commit: {}", message))
            .map_err(|e| SnapshotError::store(format!("Failed to update {}: {}", name, e)))?;

        debug!("Moved {} to {}", name, commit);
        Ok(())
    }

    fn head_branch(&self) -> &str {
        &self.branch
    }

    fn sync_index(&mut self, tree: ObjectId) -> Result<(), SnapshotError> {
        if self.repo.is_bare() {
            return Ok(());
        }

        let mut index = self
            .repo
            .index_from_tree(&tree)
            .map_err(|e| SnapshotError::store(format!("Failed to build index: {}", e)))?;
        index
            .write(Default::default())
            .map_err(|e| SnapshotError::store(format!("Failed to write index: {}", e)))?;
        Ok(())
    }
}

fn to_actor(signature: &Signature) -> gix::actor::Signature {
    gix::actor::Signature {
        name: signature.name.as_str().into(),
        email: signature.email.as_str().into(),
        time: gix::date::Time::new(signature.seconds, signature.offset),
    }
}
