use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::codec::normalize;

/// Environment variable overriding the tix state directory.
pub const TIX_DIR_ENV: &str = "TIX_DIR";

/// Branch tickets live on unless configured otherwise.
pub const DEFAULT_BRANCH: &str = "ticgit";

/// `~/.config/tix/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Root of per-repository local state. Defaults to `~/.tix`.
    #[serde(default)]
    pub tix_dir: Option<PathBuf>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Settings after layering env over the user config over defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub tix_dir: PathBuf,
    pub branch: String,
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("tix/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config() -> Result<EffectiveConfig> {
    let user = load_user_config()?;
    let env_dir = env::var_os(TIX_DIR_ENV).map(PathBuf::from);
    Ok(resolve(user, env_dir, dirs::home_dir()))
}

fn resolve(user: UserConfig, env_dir: Option<PathBuf>, home: Option<PathBuf>) -> EffectiveConfig {
    let tix_dir = env_dir
        .filter(|p| !p.as_os_str().is_empty())
        .or(user.tix_dir)
        .unwrap_or_else(|| home.unwrap_or_else(env::temp_dir).join(".tix"));

    let branch = user
        .branch
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    EffectiveConfig { tix_dir, branch }
}

/// Per-repository local state under the tix dir.
///
/// Nothing here is shared between clones; all of it can be deleted and is
/// rebuilt from the ticket branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPaths {
    pub root: PathBuf,
    /// Private working directory of the ticket branch.
    pub work_tree: PathBuf,
    /// Private index file of the ticket branch.
    pub index_file: PathBuf,
    /// Snapshot of index and session pointers.
    pub snapshot: PathBuf,
    /// Saved queries.
    pub settings: PathBuf,
}

impl LocalPaths {
    #[must_use]
    pub fn for_repo(tix_dir: &Path, repo_root: &Path) -> Self {
        let root = tix_dir.join(normalize(&repo_root.to_string_lossy()));
        Self {
            work_tree: root.join("working"),
            index_file: root.join("index"),
            snapshot: root.join("state.json"),
            settings: root.join("settings.toml"),
            root,
        }
    }
}
