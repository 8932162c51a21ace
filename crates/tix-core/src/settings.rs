//! Saved list queries, kept in `settings.toml` next to the snapshot.
//!
//! ```toml
//! [list_options.mine]
//! assigned = "alice"
//! order = "date.desc"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TixError};
use crate::query::QueryOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub list_options: BTreeMap<String, QueryOptions>,
}

impl Settings {
    /// Load from `path`. Absent or malformed files yield empty settings.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "settings unreadable, ignoring: {e}");
                return Self::default();
            }
        };
        toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "settings malformed, ignoring: {e}");
            Self::default()
        })
    }

    /// # Errors
    ///
    /// [`TixError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TixError::io(parent, e))?;
        }
        let body = toml::to_string_pretty(self).map_err(|e| {
            TixError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(path, body).map_err(|e| TixError::io(path, e))
    }

    #[must_use]
    pub fn saved(&self, name: &str) -> Option<&QueryOptions> {
        self.list_options.get(name)
    }
}
