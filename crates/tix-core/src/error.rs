use std::fmt;
use std::path::PathBuf;

use crate::backend::BackendError;

/// Machine-readable error codes for scripting and agent-friendly output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    RepoNotFound,
    ConfigParseError,
    InvalidTitle,
    InvalidState,
    InvalidPattern,
    InvalidName,
    FormatCorruption,
    TransactionFailure,
    BackendUnavailable,
    LocalStateWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::RepoNotFound => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidTitle => "E2001",
            Self::InvalidState => "E2002",
            Self::InvalidPattern => "E2003",
            Self::InvalidName => "E2004",
            Self::FormatCorruption => "E3001",
            Self::TransactionFailure => "E4001",
            Self::BackendUnavailable => "E4002",
            Self::LocalStateWriteFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::RepoNotFound => "No git repository found",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidTitle => "Ticket title is empty",
            Self::InvalidState => "Unknown ticket state",
            Self::InvalidPattern => "Invalid filter pattern",
            Self::InvalidName => "Value cannot be stored in a marker filename",
            Self::FormatCorruption => "Ticket branch entry violates the record format",
            Self::TransactionFailure => "Ticket branch transaction failed",
            Self::BackendUnavailable => "git command failed",
            Self::LocalStateWriteFailed => "Local state write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::RepoNotFound => Some("Run inside a git working tree or set GIT_WORKING_DIR."),
            Self::ConfigParseError => Some("Fix syntax in the tix config.toml and retry."),
            Self::InvalidTitle => Some("Pass a non-empty --title."),
            Self::InvalidState => Some("Use one of: open, resolved, invalid, hold."),
            Self::InvalidPattern => Some("Filters are regular expressions; escape special characters."),
            Self::InvalidName => Some("Use a value without '/' that is not '.' or '..'."),
            Self::FormatCorruption => {
                Some("Inspect the ticket branch with `git ls-tree -r ticgit` and fix the entry.")
            }
            Self::TransactionFailure => {
                Some("Check `git symbolic-ref HEAD` still points at your branch before retrying.")
            }
            Self::BackendUnavailable => Some("Verify `git` is installed and the repository is readable."),
            Self::LocalStateWriteFailed => Some("Check disk space and write permissions on the tix dir."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the ticket store and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum TixError {
    #[error("no git repository found from {}", .0.display())]
    RepoNotFound(PathBuf),

    #[error("ticket title must not be empty")]
    InvalidTitle,

    #[error("invalid state '{0}': expected one of open, resolved, invalid, hold")]
    InvalidState(String),

    #[error("invalid {field} pattern '{pattern}': {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A user or assignee that would not form a single path component.
    #[error("invalid {field} '{value}': must be a single path component")]
    InvalidName { field: &'static str, value: String },

    #[error("corrupt ticket entry '{entry}': {reason}")]
    FormatCorruption { entry: String, reason: String },

    /// A backend primitive failed inside a branch transaction.
    #[error("transaction on branch '{branch}' failed: {source}")]
    TransactionFailure {
        branch: String,
        #[source]
        source: Box<TixError>,
    },

    /// Restoring the caller's HEAD failed. Always fatal.
    #[error("failed to restore HEAD to {head} after ticket transaction: {source}")]
    RestoreFailed {
        head: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("local state I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TixError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RepoNotFound(_) => ErrorCode::RepoNotFound,
            Self::InvalidTitle => ErrorCode::InvalidTitle,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::InvalidPattern { .. } => ErrorCode::InvalidPattern,
            Self::InvalidName { .. } => ErrorCode::InvalidName,
            Self::FormatCorruption { .. } => ErrorCode::FormatCorruption,
            Self::TransactionFailure { .. } | Self::RestoreFailed { .. } => {
                ErrorCode::TransactionFailure
            }
            Self::Backend(_) => ErrorCode::BackendUnavailable,
            Self::Io { .. } => ErrorCode::LocalStateWriteFailed,
        }
    }

    pub(crate) fn corrupt(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FormatCorruption {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TixError> = std::result::Result<T, E>;
