//! [`TreeStore`] backed by the `git` command-line tool.
//!
//! Bound operations run with `GIT_DIR`, `GIT_INDEX_FILE` and `GIT_WORK_TREE`
//! set, so staging and committing happen against the private ticket index
//! and working directory instead of the user's checkout.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{BackendError, Binding, BlobId, CommitSummary, Head, TreeEntry, TreeStore};

/// Env var that pins the repository root, skipping upward discovery.
pub const WORKING_DIR_ENV: &str = "GIT_WORKING_DIR";

/// A git repository driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    git_dir: PathBuf,
}

impl GitCli {
    /// Locate the repository containing `start`, walking upward until a
    /// `.git` entry is found. `GIT_WORKING_DIR` overrides the search.
    ///
    /// Returns `Ok(None)` when no repository is discoverable.
    pub fn discover(start: &Path) -> Result<Option<Self>, BackendError> {
        let Some(root) = find_repo_root(start, env::var_os(WORKING_DIR_ENV).map(PathBuf::from))
        else {
            return Ok(None);
        };

        let out = run(Command::new("git")
            .current_dir(&root)
            .args(["rev-parse", "--absolute-git-dir"]))?;
        let git_dir = PathBuf::from(stdout_line(&out)?);
        tracing::debug!(root = %root.display(), git_dir = %git_dir.display(), "opened git repository");

        Ok(Some(Self { root, git_dir }))
    }

    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// `git` rooted at the user's working tree.
    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root).env("GIT_DIR", &self.git_dir);
        cmd
    }

    /// `git` bound to the private index and working directory.
    fn bound(&self, binding: &Binding) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&binding.work_tree)
            .env("GIT_DIR", &self.git_dir)
            .env("GIT_INDEX_FILE", &binding.index_file)
            .env("GIT_WORK_TREE", &binding.work_tree);
        cmd
    }
}

fn find_repo_root(start: &Path, pinned: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(dir) = pinned {
        return Some(dir);
    }

    let full = if start.is_absolute() {
        start.to_path_buf()
    } else {
        env::current_dir().ok()?.join(start)
    };

    full.ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn describe(cmd: &Command) -> String {
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    format!("git {}", args.join(" "))
}

fn spawn(cmd: &mut Command) -> Result<Output, BackendError> {
    cmd.output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            BackendError::Unavailable("`git` executable not found on PATH".to_string())
        } else {
            BackendError::Io(e)
        }
    })
}

/// Run and require success.
fn run(cmd: &mut Command) -> Result<Output, BackendError> {
    let out = spawn(cmd)?;
    if out.status.success() {
        Ok(out)
    } else {
        Err(BackendError::CommandFailed {
            command: describe(cmd),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }
}

/// Run a query whose exit status 1 means "absent" rather than failure.
fn run_optional(cmd: &mut Command) -> Result<Option<Output>, BackendError> {
    let out = spawn(cmd)?;
    match out.status.code() {
        Some(0) => Ok(Some(out)),
        Some(1) => Ok(None),
        _ => Err(BackendError::CommandFailed {
            command: describe(cmd),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
    }
}

fn stdout_line(out: &Output) -> Result<String, BackendError> {
    let text = String::from_utf8(out.stdout.clone())
        .map_err(|e| BackendError::InvalidOutput(e.to_string()))?;
    Ok(text.trim().to_string())
}

fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

/// Parse `git ls-tree -r -z` output into blob entries.
fn parse_ls_tree(raw: &[u8]) -> Result<Vec<TreeEntry>, BackendError> {
    let mut entries = Vec::new();
    for record in raw.split(|b| *b == 0).filter(|r| !r.is_empty()) {
        let record = std::str::from_utf8(record)
            .map_err(|e| BackendError::InvalidOutput(format!("ls-tree: {e}")))?;
        let (meta, path) = record
            .split_once('\t')
            .ok_or_else(|| BackendError::InvalidOutput(format!("ls-tree record: {record}")))?;
        let mut fields = meta.split_whitespace();
        let (_mode, kind, sha) = match (fields.next(), fields.next(), fields.next()) {
            (Some(mode), Some(kind), Some(sha)) => (mode, kind, sha),
            _ => {
                return Err(BackendError::InvalidOutput(format!(
                    "ls-tree record: {record}"
                )));
            }
        };
        if kind == "blob" {
            entries.push(TreeEntry::new(path, BlobId::new(sha)));
        }
    }
    Ok(entries)
}

/// Parse `git log --format=%H%x1f%ct%x1f%s` output.
fn parse_log(text: &str) -> Result<Vec<CommitSummary>, BackendError> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, '\u{1f}');
            let id = parts.next().unwrap_or_default();
            let time = parts
                .next()
                .and_then(|t| t.parse::<i64>().ok())
                .ok_or_else(|| BackendError::InvalidOutput(format!("log line: {line}")))?;
            let message = parts.next().unwrap_or_default();
            Ok(CommitSummary {
                id: id.to_string(),
                time,
                message: message.to_string(),
            })
        })
        .collect()
}

impl TreeStore for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        run_optional(self.git().args(["config", "--get", key]))?
            .map(|out| stdout_line(&out))
            .transpose()
    }

    fn branch_head(&self, branch: &str) -> Result<Option<String>, BackendError> {
        let spec = format!("{}^{{commit}}", branch_ref(branch));
        run_optional(self.git().args(["rev-parse", "--verify", "--quiet", &spec]))?
            .map(|out| stdout_line(&out))
            .transpose()
    }

    fn list_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, BackendError> {
        let out = run(self.git().args(["ls-tree", "-r", "-z", &branch_ref(branch)]))?;
        parse_ls_tree(&out.stdout)
    }

    fn read_blob(&self, id: &BlobId) -> Result<Vec<u8>, BackendError> {
        Ok(run(self.git().args(["cat-file", "blob", id.as_str()]))?.stdout)
    }

    fn head(&self) -> Result<Head, BackendError> {
        if let Some(out) = run_optional(self.git().args(["symbolic-ref", "-q", "HEAD"]))? {
            let full = stdout_line(&out)?;
            let name = full.strip_prefix("refs/heads/").unwrap_or(&full);
            return Ok(Head::Branch(name.to_string()));
        }
        let out = run(self.git().args(["rev-parse", "HEAD"]))?;
        Ok(Head::Detached(stdout_line(&out)?))
    }

    fn set_head(&self, head: &Head) -> Result<(), BackendError> {
        match head {
            Head::Branch(name) => {
                run(self.git().args(["symbolic-ref", "HEAD", &branch_ref(name)]))?;
            }
            Head::Detached(commit) => {
                run(self.git().args(["update-ref", "--no-deref", "HEAD", commit]))?;
            }
        }
        Ok(())
    }

    fn materialize(&self, binding: &Binding, branch: &str) -> Result<(), BackendError> {
        run(self.bound(binding).args(["read-tree", &branch_ref(branch)]))?;
        run(self.bound(binding).args(["checkout-index", "-a", "-f"]))?;
        Ok(())
    }

    fn stage_all(&self, binding: &Binding) -> Result<(), BackendError> {
        run(self.bound(binding).args(["add", "-A", "."]))?;
        Ok(())
    }

    fn commit(&self, binding: &Binding, message: &str) -> Result<(), BackendError> {
        run(self
            .bound(binding)
            .args(["commit", "-q", "--no-verify", "-m", message]))?;
        Ok(())
    }

    fn remove(&self, binding: &Binding, path: &Path) -> Result<(), BackendError> {
        run(self
            .bound(binding)
            .args(["rm", "-q", "--ignore-unmatch", "--"])
            .arg(path))?;
        Ok(())
    }

    fn history(
        &self,
        branch: &str,
        path: Option<&str>,
    ) -> Result<Vec<CommitSummary>, BackendError> {
        let mut cmd = self.git();
        cmd.args(["log", "--format=%H%x1f%ct%x1f%s", &branch_ref(branch)]);
        if let Some(path) = path {
            cmd.args(["--", path]);
        }
        let out = run(&mut cmd)?;
        let text = String::from_utf8(out.stdout)
            .map_err(|e| BackendError::InvalidOutput(e.to_string()))?;
        parse_log(&text)
    }
}
