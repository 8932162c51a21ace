//! Branch-scoped transactions.
//!
//! Every mutation runs inside [`TicketBranch::run`]: HEAD is pointed at the
//! ticket branch, index and working-tree operations are bound to a private
//! index file and working directory, the caller's operation writes marker
//! files and commits, and HEAD is put back where it was. The caller's own
//! checkout and index are never read or written.
//!
//! Committed history is never rolled back. When an operation fails, the
//! private working directory is discarded so the next transaction
//! re-materializes it from the branch and cannot stage leftovers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{BackendError, Binding, Head, TreeStore};
use crate::error::{Result, TixError};

/// Sentinel file proving the private working directory was materialized.
pub const SENTINEL: &str = ".hold";

/// Commit message of the bootstrap commit.
pub const BOOTSTRAP_MESSAGE: &str = "creating the ticket branch";

/// The dedicated ticket branch plus its private index and working directory.
#[derive(Debug, Clone)]
pub struct TicketBranch {
    branch: String,
    binding: Binding,
}

impl TicketBranch {
    pub fn new(branch: impl Into<String>, binding: Binding) -> Self {
        Self {
            branch: branch.into(),
            binding,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.branch
    }

    #[must_use]
    pub fn work_tree(&self) -> &Path {
        &self.binding.work_tree
    }

    /// Run `op` against the ticket branch and restore HEAD afterwards.
    ///
    /// Creates the branch with a bootstrap commit first if it does not exist.
    /// The working directory is re-materialized when it is missing, lacks
    /// the sentinel, or was last synced to a different branch tip.
    ///
    /// # Errors
    ///
    /// - [`TixError::TransactionFailure`] wrapping whatever `op` or a backend
    ///   primitive returned, after HEAD was restored.
    /// - [`TixError::RestoreFailed`] if HEAD could not be restored. This wins
    ///   over an `op` error, which is logged instead.
    pub fn run<S, T>(&self, store: &S, op: impl FnOnce(&Workspace<'_, S>) -> Result<T>) -> Result<T>
    where
        S: TreeStore + ?Sized,
    {
        let exists = store
            .branch_exists(&self.branch)
            .map_err(|e| self.failure(e.into()))?;
        if !exists {
            self.bootstrap(store)?;
        }
        self.run_in_branch(store, op)
    }

    fn bootstrap<S: TreeStore + ?Sized>(&self, store: &S) -> Result<()> {
        tracing::info!(branch = %self.branch, "creating ticket branch");
        if self.binding.work_tree.exists() {
            self.discard_working_area();
        }
        self.run_in_branch(store, |ws| {
            ws.write_file(SENTINEL, "hold\n")?;
            ws.stage_all()?;
            ws.commit(BOOTSTRAP_MESSAGE)
        })
    }

    fn tip_file(&self) -> PathBuf {
        self.binding.index_file.with_extension("tip")
    }

    fn needs_materialize(&self, tip: &str) -> bool {
        let work_tree = &self.binding.work_tree;
        if !work_tree.is_dir() || !work_tree.join(SENTINEL).is_file() {
            return true;
        }
        let synced = fs::read_to_string(self.tip_file()).unwrap_or_default();
        if synced.trim() == tip {
            false
        } else {
            tracing::debug!(branch = %self.branch, tip, "ticket branch moved since last sync");
            true
        }
    }

    fn record_tip<S: TreeStore + ?Sized>(&self, store: &S) {
        let path = self.tip_file();
        let result = match store.branch_head(&self.branch) {
            Ok(Some(tip)) => fs::write(&path, format!("{tip}\n")).map_err(|e| e.to_string()),
            Ok(None) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(err) = result {
            // Next run re-materializes; nothing is lost.
            tracing::warn!(path = %path.display(), error = %err, "could not record synced branch tip");
        }
    }

    fn run_in_branch<S, T>(&self, store: &S, op: impl FnOnce(&Workspace<'_, S>) -> Result<T>) -> Result<T>
    where
        S: TreeStore + ?Sized,
    {
        let tip = store
            .branch_head(&self.branch)
            .map_err(|e| self.failure(e.into()))?;
        let materialize = tip.as_deref().is_some_and(|tip| self.needs_materialize(tip));

        let work_tree = &self.binding.work_tree;
        if materialize && work_tree.exists() {
            self.discard_working_area();
        }
        fs::create_dir_all(work_tree)
            .map_err(|e| self.failure(TixError::io(work_tree, e)))?;
        if let Some(parent) = self.binding.index_file.parent() {
            fs::create_dir_all(parent).map_err(|e| self.failure(TixError::io(parent, e)))?;
        }

        let guard =
            HeadGuard::redirect(store, &self.branch).map_err(|e| self.failure(e.into()))?;

        let outcome = (|| -> Result<T> {
            if materialize {
                tracing::debug!(branch = %self.branch, dir = %work_tree.display(), "materializing ticket working area");
                store.materialize(&self.binding, &self.branch)?;
            }
            op(&Workspace {
                store,
                binding: &self.binding,
            })
        })();

        if outcome.is_ok() {
            self.record_tip(store);
        } else {
            self.discard_working_area();
        }

        match (outcome, guard.restore()) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), Ok(())) => Err(self.failure(err)),
            (Ok(_), Err(restore)) => Err(restore),
            (Err(err), Err(restore)) => {
                tracing::error!(branch = %self.branch, error = %err, "ticket operation failed and HEAD restore failed");
                Err(restore)
            }
        }
    }

    fn discard_working_area(&self) {
        let work_tree = &self.binding.work_tree;
        if let Err(err) = fs::remove_dir_all(work_tree) {
            tracing::warn!(dir = %work_tree.display(), error = %err, "could not discard ticket working area");
        }
    }

    fn failure(&self, source: TixError) -> TixError {
        match source {
            TixError::TransactionFailure { .. } | TixError::RestoreFailed { .. } => source,
            other => TixError::TransactionFailure {
                branch: self.branch.clone(),
                source: Box::new(other),
            },
        }
    }
}

/// Points HEAD at the ticket branch for its lifetime.
///
/// [`HeadGuard::restore`] reports restoration errors; `Drop` restores
/// best-effort when the guard is abandoned (e.g. while unwinding).
pub struct HeadGuard<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    previous: Head,
    restored: bool,
}

impl<'a, S: TreeStore + ?Sized> HeadGuard<'a, S> {
    /// Record the current HEAD and point it at `branch`.
    ///
    /// # Errors
    ///
    /// Backend failure reading or moving HEAD. HEAD is unchanged in that case.
    pub fn redirect(store: &'a S, branch: &str) -> Result<Self, BackendError> {
        let previous = store.head()?;
        store.set_head(&Head::Branch(branch.to_string()))?;
        tracing::trace!(%previous, branch, "HEAD redirected to ticket branch");
        Ok(Self {
            store,
            previous,
            restored: false,
        })
    }

    #[must_use]
    pub const fn previous(&self) -> &Head {
        &self.previous
    }

    /// Put HEAD back.
    ///
    /// # Errors
    ///
    /// [`TixError::RestoreFailed`], which callers must treat as fatal.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.store
            .set_head(&self.previous)
            .map_err(|source| TixError::RestoreFailed {
                head: self.previous.to_string(),
                source,
            })
    }
}

impl<S: TreeStore + ?Sized> Drop for HeadGuard<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = self.store.set_head(&self.previous) {
            tracing::error!(previous = %self.previous, error = %err, "failed to restore HEAD");
        }
    }
}

/// Handle given to transaction operations: the bound working directory.
pub struct Workspace<'a, S: TreeStore + ?Sized> {
    store: &'a S,
    binding: &'a Binding,
}

impl<S: TreeStore + ?Sized> Workspace<'_, S> {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.binding.work_tree
    }

    fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.binding.work_tree.join(rel)
    }

    #[must_use]
    pub fn exists(&self, rel: impl AsRef<Path>) -> bool {
        self.resolve(rel).exists()
    }

    /// Write `contents` to `rel`, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`TixError::Io`] on filesystem failure.
    pub fn write_file(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let path = self.resolve(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TixError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| TixError::io(&path, e))
    }

    /// Copy an outside file into the working directory at `rel`.
    ///
    /// # Errors
    ///
    /// [`TixError::Io`] on filesystem failure.
    pub fn copy_in(&self, source: &Path, rel: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TixError::io(parent, e))?;
        }
        fs::copy(source, &path)
            .map(|_| ())
            .map_err(|e| TixError::io(source, e))
    }

    /// Remove `rel` from the bound index and working directory.
    ///
    /// # Errors
    ///
    /// Backend failure.
    pub fn remove(&self, rel: impl AsRef<Path>) -> Result<()> {
        Ok(self.store.remove(self.binding, rel.as_ref())?)
    }

    /// # Errors
    ///
    /// Backend failure.
    pub fn stage_all(&self) -> Result<()> {
        Ok(self.store.stage_all(self.binding)?)
    }

    /// # Errors
    ///
    /// Backend failure.
    pub fn commit(&self, message: &str) -> Result<()> {
        tracing::debug!(message, "committing to ticket branch");
        Ok(self.store.commit(self.binding, message)?)
    }
}
