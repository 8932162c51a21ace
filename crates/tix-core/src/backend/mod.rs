//! Versioned tree backend.
//!
//! tix never implements version control itself. Everything it persists goes
//! through the [`TreeStore`] primitives: enumerate a branch's tree, read a
//! blob, move HEAD, and run index/worktree operations against an explicit
//! [`Binding`] so the caller's own index and checkout are never touched.
//!
//! - [`git::GitCli`]: production backend, shells out to `git`.
//! - [`memory::MemoryTreeStore`]: in-process backend with fault injection,
//!   used by the test suites.

pub mod git;
pub mod memory;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from backend primitives. These always propagate.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached at all (e.g. `git` is not installed).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A backend command ran and reported failure.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The backend produced output we could not interpret.
    #[error("unexpected backend output: {0}")]
    InvalidOutput(String),

    #[error("backend I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Content address of a blob.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One blob entry of a recursively listed branch tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Slash-separated path relative to the tree root.
    pub path: String,
    pub blob: BlobId,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, blob: BlobId) -> Self {
        Self {
            path: path.into(),
            blob,
        }
    }
}

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    Branch(String),
    Detached(String),
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "branch '{name}'"),
            Self::Detached(commit) => write!(f, "detached commit {commit}"),
        }
    }
}

/// Alternate index file and working directory for bound operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub index_file: PathBuf,
    pub work_tree: PathBuf,
}

/// One commit of branch history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub id: String,
    /// Commit time, epoch seconds.
    pub time: i64,
    pub message: String,
}

/// Primitive operations tix needs from a versioned tree store.
pub trait TreeStore {
    /// Root of the working tree this store was opened for.
    fn root(&self) -> &Path;

    /// Read a configuration value, `None` when unset.
    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Commit id at the tip of `branch`, `None` when the branch does not exist.
    fn branch_head(&self, branch: &str) -> Result<Option<String>, BackendError>;

    fn branch_exists(&self, branch: &str) -> Result<bool, BackendError> {
        Ok(self.branch_head(branch)?.is_some())
    }

    /// Every blob in `branch`'s tree, at any depth.
    fn list_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, BackendError>;

    fn read_blob(&self, id: &BlobId) -> Result<Vec<u8>, BackendError>;

    fn head(&self) -> Result<Head, BackendError>;

    /// Repoint HEAD without touching any index or working tree.
    fn set_head(&self, head: &Head) -> Result<(), BackendError>;

    /// Populate the bound index and working directory from `branch`.
    fn materialize(&self, binding: &Binding, branch: &str) -> Result<(), BackendError>;

    /// Stage every addition, modification and deletion under the bound working directory.
    fn stage_all(&self, binding: &Binding) -> Result<(), BackendError>;

    /// Commit the bound index onto the branch HEAD points at.
    fn commit(&self, binding: &Binding, message: &str) -> Result<(), BackendError>;

    /// Remove `path` (relative to the bound working directory) from index and disk.
    fn remove(&self, binding: &Binding, path: &Path) -> Result<(), BackendError>;

    /// Commits reachable from `branch`, newest first, optionally limited to `path`.
    fn history(
        &self,
        branch: &str,
        path: Option<&str>,
    ) -> Result<Vec<CommitSummary>, BackendError>;
}
