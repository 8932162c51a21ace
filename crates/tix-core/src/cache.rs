//! Persistent snapshot of the index and session pointers.
//!
//! Loading the snapshot lets a short-lived process skip decoding the whole
//! ticket branch. The snapshot records the branch head it was built from;
//! when the branch has moved (another clone pushed, someone committed by
//! hand) the index part is stale and gets rebuilt, but the session pointers
//! (last listing, current ticket) are kept.
//!
//! Snapshot I/O never fails the caller: a missing or unreadable snapshot is
//! a rebuild, a failed write is a `warn` log.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::Index;

/// Bumped whenever the snapshot layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Process-independent session pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Ticket names of the last listing, in display order.
    #[serde(default)]
    pub last_tickets: Vec<String>,
    /// Ticket selected with `checkout`.
    #[serde(default)]
    pub current_ticket: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Commit the index was decoded from. `None` before the branch exists.
    pub branch_head: Option<String>,
    pub index: Index,
    #[serde(flatten)]
    pub session: Session,
}

impl Snapshot {
    #[must_use]
    pub const fn new(branch_head: Option<String>, index: Index, session: Session) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            branch_head,
            index,
            session,
        }
    }

    /// True when the index was built from `branch_head`.
    #[must_use]
    pub fn is_fresh(&self, branch_head: Option<&str>) -> bool {
        self.version == SNAPSHOT_VERSION && self.branch_head.as_deref() == branch_head
    }
}

/// Where the store's index came from at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fresh snapshot, no decode needed.
    Snapshot,
    /// Snapshot stale; index rebuilt, session pointers carried over.
    StaleRebuilt,
    /// No usable snapshot; everything rebuilt.
    Rebuilt,
}

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `None` when absent or unreadable.
    #[must_use]
    pub fn load(&self) -> Option<Snapshot> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "snapshot unreadable, rebuilding: {e}");
                return None;
            }
        };
        match serde_json::from_slice::<Snapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "snapshot decode failed, rebuilding: {e}");
                None
            }
        }
    }

    /// Write the snapshot. Failures are logged and swallowed.
    pub fn store(&self, snapshot: &Snapshot) {
        match self.write(snapshot) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "snapshot written"),
            Err(e) => tracing::warn!("snapshot write failed (non-fatal): {e:#}"),
        }
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_vec(snapshot).context("failed to serialize snapshot")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "failed to atomically move {} to {}",
                tmp.display(),
                self.path.display()
            )
        })
    }
}
