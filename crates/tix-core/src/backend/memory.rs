//! In-process [`TreeStore`] with blake3 content addressing.
//!
//! Bound operations use the real filesystem for the working directory (the
//! transaction manager writes ordinary files there) but keep indexes,
//! branches and blobs in memory. Faults can be injected per primitive to
//! exercise failure paths.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::{BackendError, Binding, BlobId, CommitSummary, Head, TreeEntry, TreeStore};

/// Snapshot of a tree: path → blob.
type Tree = BTreeMap<String, BlobId>;

#[derive(Debug, Clone)]
struct Commit {
    id: String,
    time: i64,
    message: String,
    tree: Tree,
}

/// Primitive that can be made to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Every `commit` fails.
    Commit,
    /// `set_head` to this branch fails.
    SetHead(String),
    /// Every `stage_all` fails.
    Stage,
}

#[derive(Debug, Default)]
struct State {
    head: Option<Head>,
    config: HashMap<String, String>,
    branches: HashMap<String, Vec<Commit>>,
    blobs: HashMap<BlobId, Vec<u8>>,
    indexes: HashMap<PathBuf, Tree>,
    faults: HashSet<Fault>,
    clock: i64,
}

/// In-memory versioned tree store.
#[derive(Debug)]
pub struct MemoryTreeStore {
    root: PathBuf,
    state: RefCell<State>,
}

impl MemoryTreeStore {
    /// A store whose HEAD points at `main`, with no branches yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let state = State {
            head: Some(Head::Branch("main".to_string())),
            clock: 1_700_000_000,
            ..State::default()
        };
        Self {
            root: root.into(),
            state: RefCell::new(state),
        }
    }

    #[must_use]
    pub fn with_config(self, key: &str, value: &str) -> Self {
        self.state
            .borrow_mut()
            .config
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.state.borrow_mut().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Store `content` and return its id.
    pub fn put_blob(&self, content: &[u8]) -> BlobId {
        let id = BlobId::new(blake3::hash(content).to_hex().to_string());
        self.state
            .borrow_mut()
            .blobs
            .entry(id.clone())
            .or_insert_with(|| content.to_vec());
        id
    }

    /// Commit a tree directly onto `branch`, bypassing any binding.
    pub fn seed_branch(&self, branch: &str, files: &[(&str, &[u8])], message: &str) {
        let tree: Tree = files
            .iter()
            .map(|(path, content)| ((*path).to_string(), self.put_blob(content)))
            .collect();
        let mut state = self.state.borrow_mut();
        push_commit(&mut state, branch, tree, message);
    }

    /// Number of commits on `branch`.
    #[must_use]
    pub fn commit_count(&self, branch: &str) -> usize {
        self.state
            .borrow()
            .branches
            .get(branch)
            .map_or(0, Vec::len)
    }

    fn check(&self, fault: &Fault) -> Result<(), BackendError> {
        if self.state.borrow().faults.contains(fault) {
            return Err(BackendError::CommandFailed {
                command: format!("{fault:?}"),
                stderr: "injected fault".to_string(),
            });
        }
        Ok(())
    }

    fn tip(&self, branch: &str) -> Option<Commit> {
        self.state
            .borrow()
            .branches
            .get(branch)
            .and_then(|commits| commits.last().cloned())
    }
}

fn push_commit(state: &mut State, branch: &str, tree: Tree, message: &str) {
    state.clock += 1;
    let commits = state.branches.entry(branch.to_string()).or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(branch.as_bytes());
    hasher.update(&commits.len().to_le_bytes());
    hasher.update(message.as_bytes());
    for (path, blob) in &tree {
        hasher.update(path.as_bytes());
        hasher.update(blob.as_str().as_bytes());
    }
    commits.push(Commit {
        id: hasher.finalize().to_hex().to_string(),
        time: state.clock,
        message: message.to_string(),
        tree,
    });
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), BackendError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn touches(tree: &Tree, prefix: &str) -> Tree {
    let dir = format!("{prefix}/");
    tree.iter()
        .filter(|(path, _)| path.as_str() == prefix || path.starts_with(&dir))
        .map(|(p, b)| (p.clone(), b.clone()))
        .collect()
}

impl TreeStore for MemoryTreeStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.state.borrow().config.get(key).cloned())
    }

    fn branch_head(&self, branch: &str) -> Result<Option<String>, BackendError> {
        Ok(self.tip(branch).map(|c| c.id))
    }

    fn list_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, BackendError> {
        let tip = self.tip(branch).ok_or_else(|| BackendError::CommandFailed {
            command: format!("list_tree {branch}"),
            stderr: format!("unknown branch '{branch}'"),
        })?;
        Ok(tip
            .tree
            .into_iter()
            .map(|(path, blob)| TreeEntry::new(path, blob))
            .collect())
    }

    fn read_blob(&self, id: &BlobId) -> Result<Vec<u8>, BackendError> {
        self.state
            .borrow()
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::CommandFailed {
                command: format!("read_blob {id}"),
                stderr: "no such blob".to_string(),
            })
    }

    fn head(&self) -> Result<Head, BackendError> {
        self.state
            .borrow()
            .head
            .clone()
            .ok_or_else(|| BackendError::InvalidOutput("HEAD is unset".to_string()))
    }

    fn set_head(&self, head: &Head) -> Result<(), BackendError> {
        if let Head::Branch(name) = head {
            self.check(&Fault::SetHead(name.clone()))?;
        }
        self.state.borrow_mut().head = Some(head.clone());
        Ok(())
    }

    fn materialize(&self, binding: &Binding, branch: &str) -> Result<(), BackendError> {
        let tip = self.tip(branch).ok_or_else(|| BackendError::CommandFailed {
            command: format!("materialize {branch}"),
            stderr: format!("unknown branch '{branch}'"),
        })?;
        for (path, blob) in &tip.tree {
            let target = binding.work_tree.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, self.read_blob(blob)?)?;
        }
        self.state
            .borrow_mut()
            .indexes
            .insert(binding.index_file.clone(), tip.tree);
        Ok(())
    }

    fn stage_all(&self, binding: &Binding) -> Result<(), BackendError> {
        self.check(&Fault::Stage)?;
        let mut files = Vec::new();
        walk(&binding.work_tree, &mut files)?;
        let mut tree = Tree::new();
        for file in files {
            let Some(key) = relative_key(&binding.work_tree, &file) else {
                continue;
            };
            let content = fs::read(&file)?;
            tree.insert(key, self.put_blob(&content));
        }
        self.state
            .borrow_mut()
            .indexes
            .insert(binding.index_file.clone(), tree);
        Ok(())
    }

    fn commit(&self, binding: &Binding, message: &str) -> Result<(), BackendError> {
        self.check(&Fault::Commit)?;
        let branch = match self.head()? {
            Head::Branch(name) => name,
            Head::Detached(_) => {
                return Err(BackendError::CommandFailed {
                    command: "commit".to_string(),
                    stderr: "HEAD is detached".to_string(),
                });
            }
        };
        let tree = self
            .state
            .borrow()
            .indexes
            .get(&binding.index_file)
            .cloned()
            .unwrap_or_default();
        if self.tip(&branch).is_some_and(|tip| tip.tree == tree) {
            return Err(BackendError::CommandFailed {
                command: "commit".to_string(),
                stderr: "nothing to commit".to_string(),
            });
        }
        push_commit(&mut self.state.borrow_mut(), &branch, tree, message);
        Ok(())
    }

    fn remove(&self, binding: &Binding, path: &Path) -> Result<(), BackendError> {
        let target = binding.work_tree.join(path);
        if target.exists() {
            fs::remove_file(&target)?;
        }
        let key = relative_key(&binding.work_tree, &target).unwrap_or_default();
        if let Some(index) = self.state.borrow_mut().indexes.get_mut(&binding.index_file) {
            index.remove(&key);
        }
        Ok(())
    }

    fn history(
        &self,
        branch: &str,
        path: Option<&str>,
    ) -> Result<Vec<CommitSummary>, BackendError> {
        let state = self.state.borrow();
        let Some(commits) = state.branches.get(branch) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        let mut previous = Tree::new();
        for commit in commits {
            let changed = path.is_none_or(|p| touches(&commit.tree, p) != touches(&previous, p));
            if changed {
                out.push(CommitSummary {
                    id: commit.id.clone(),
                    time: commit.time,
                    message: commit.message.clone(),
                });
            }
            previous.clone_from(&commit.tree);
        }
        out.reverse();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn binding(tmp: &TempDir) -> Binding {
        let work_tree = tmp.path().join("working");
        fs::create_dir_all(&work_tree).expect("mkdir");
        Binding {
            index_file: tmp.path().join("index"),
            work_tree,
        }
    }

    #[test]
    fn stage_and_commit_land_on_head_branch() {
        let tmp = TempDir::new().expect("tempdir");
        let store = MemoryTreeStore::new(tmp.path());
        let bind = binding(&tmp);
        store
            .set_head(&Head::Branch("tickets".into()))
            .expect("set head");
        fs::create_dir_all(bind.work_tree.join("t1")).expect("mkdir");
        fs::write(bind.work_tree.join("t1/STATE_open"), "open").expect("write");
        store.stage_all(&bind).expect("stage");
        store.commit(&bind, "first").expect("commit");

        let entries = store.list_tree("tickets").expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "t1/STATE_open");
        assert_eq!(store.read_blob(&entries[0].blob).expect("blob"), b"open");
    }

    #[test]
    fn empty_commit_is_refused() {
        let tmp = TempDir::new().expect("tempdir");
        let store = MemoryTreeStore::new(tmp.path());
        let bind = binding(&tmp);
        fs::write(bind.work_tree.join(".hold"), "hold").expect("write");
        store.stage_all(&bind).expect("stage");
        store.commit(&bind, "first").expect("commit");
        assert!(store.commit(&bind, "again").is_err());
    }

    #[test]
    fn history_filters_by_path() {
        let tmp = TempDir::new().expect("tempdir");
        let store = MemoryTreeStore::new(tmp.path());
        store.seed_branch("b", &[("a/x", b"1")], "one");
        store.seed_branch("b", &[("a/x", b"1"), ("c/y", b"2")], "two");
        store.seed_branch("b", &[("a/x", b"3"), ("c/y", b"2")], "three");

        let all = store.history("b", None).expect("history");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "three");

        let only_c: Vec<_> = store
            .history("b", Some("c"))
            .expect("history")
            .into_iter()
            .map(|c| c.message)
            .collect();
        assert_eq!(only_c, vec!["two"]);
    }

    #[test]
    fn injected_head_fault_only_hits_named_branch() {
        let tmp = TempDir::new().expect("tempdir");
        let store = MemoryTreeStore::new(tmp.path());
        store.inject(Fault::SetHead("main".into()));
        assert!(store.set_head(&Head::Branch("other".into())).is_ok());
        assert!(store.set_head(&Head::Branch("main".into())).is_err());
        store.clear_faults();
        assert!(store.set_head(&Head::Branch("main".into())).is_ok());
    }
}
