//! Marker filenames: ticket attributes encoded in entry names.
//!
//! Each file inside a ticket directory is a marker whose *name* carries the
//! attribute and whose blob carries either a redundant copy or, for comments
//! and attachments, the payload.
//!
//! ```text
//! TICKET_ID
//! STATE_<state>
//! ASSIGNED_<email>
//! TAG_<normalized tag>
//! COMMENT_<epoch>_<email>
//! ATTACHMENT_<epoch>_<email>@@<original filename>
//! ```

use std::fmt;

use crate::error::{Result, TixError};

pub const ID_FILE: &str = "TICKET_ID";
const STATE: &str = "STATE";
const ASSIGNED: &str = "ASSIGNED";
const TAG: &str = "TAG";
const COMMENT: &str = "COMMENT";
const ATTACHMENT: &str = "ATTACHMENT";

/// Separator between author and original filename in attachment markers.
pub const ATTACHMENT_SEP: &str = "@@";

/// Lowercase `text` and collapse every run of characters outside `[a-z0-9]`
/// into a single `-`.
///
/// Used for tag filenames and ticket-name slugs. Idempotent.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

/// Reject values that would not survive as one path component of a
/// marker filename.
///
/// # Errors
///
/// [`TixError::InvalidName`] for empty values, `.`, `..`, or values
/// containing `/`.
pub fn check_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains('/') {
        return Err(TixError::InvalidName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A decoded marker filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Id,
    Assigned(String),
    State(String),
    Tag(String),
    Comment {
        added: i64,
        author: String,
    },
    Attachment {
        added: i64,
        author: String,
        filename: String,
    },
    /// Token this version does not understand. Ignored on decode.
    Unknown(String),
}

impl Marker {
    /// Classify a marker filename.
    ///
    /// # Errors
    ///
    /// Returns [`TixError::FormatCorruption`] when a known token carries a
    /// missing or malformed payload.
    pub fn parse(file: &str) -> Result<Self> {
        if file == ID_FILE {
            return Ok(Self::Id);
        }

        let (token, payload) = file.split_once('_').unwrap_or((file, ""));
        let require = |what: &str| -> Result<String> {
            if payload.is_empty() {
                Err(TixError::corrupt(file, format!("missing {what}")))
            } else {
                Ok(payload.to_string())
            }
        };

        match token {
            STATE => Ok(Self::State(require("state")?)),
            ASSIGNED => Ok(Self::Assigned(require("assignee")?)),
            TAG => Ok(Self::Tag(normalize(&require("tag")?))),
            COMMENT => {
                let (added, author) = split_stamped(file, payload)?;
                Ok(Self::Comment {
                    added,
                    author: author.to_string(),
                })
            }
            ATTACHMENT => {
                let (added, rest) = split_stamped(file, payload)?;
                let (author, filename) = rest
                    .split_once(ATTACHMENT_SEP)
                    .filter(|(a, f)| !a.is_empty() && !f.is_empty())
                    .ok_or_else(|| {
                        TixError::corrupt(file, "expected <author>@@<filename>")
                    })?;
                Ok(Self::Attachment {
                    added,
                    author: author.to_string(),
                    filename: filename.to_string(),
                })
            }
            _ => Ok(Self::Unknown(file.to_string())),
        }
    }

    /// Tag marker for user-supplied text. `None` when the text is blank.
    #[must_use]
    pub fn tag(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::Tag(normalize(trimmed)))
        }
    }

    /// The filename this marker is stored under.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str(ID_FILE),
            Self::Assigned(email) => write!(f, "{ASSIGNED}_{email}"),
            Self::State(state) => write!(f, "{STATE}_{state}"),
            Self::Tag(tag) => write!(f, "{TAG}_{tag}"),
            Self::Comment { added, author } => write!(f, "{COMMENT}_{added}_{author}"),
            Self::Attachment {
                added,
                author,
                filename,
            } => write!(f, "{ATTACHMENT}_{added}_{author}{ATTACHMENT_SEP}{filename}"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Split `<epoch>_<rest>`. The rest may itself contain underscores.
fn split_stamped<'a>(file: &str, payload: &'a str) -> Result<(i64, &'a str)> {
    let (epoch, rest) = payload
        .split_once('_')
        .ok_or_else(|| TixError::corrupt(file, "expected <epoch>_<author>"))?;
    let added = epoch
        .parse::<i64>()
        .map_err(|_| TixError::corrupt(file, format!("bad epoch '{epoch}'")))?;
    if rest.is_empty() {
        return Err(TixError::corrupt(file, "missing author"));
    }
    Ok((added, rest))
}
