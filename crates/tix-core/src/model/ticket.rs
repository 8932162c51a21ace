use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use crate::backend::BlobId;

/// States a ticket can be moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketState {
    Open,
    Resolved,
    Invalid,
    Hold,
}

impl TicketState {
    pub const ALL: [Self; 4] = [Self::Open, Self::Resolved, Self::Invalid, Self::Hold];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Invalid => "invalid",
            Self::Hold => "hold",
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a state from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError {
    pub got: String,
}

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state: '{}'", self.got)
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for TicketState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| ParseStateError { got: s.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub author: String,
    /// Epoch seconds.
    pub added: i64,
    /// Body blob, fetched on demand.
    pub body: BlobId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub author: String,
    pub added: i64,
    pub filename: String,
    pub content: BlobId,
}

/// A ticket decoded from its directory on the ticket branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    /// Directory name, `<epoch>_<slug>_<random>`. Never reused.
    pub name: String,
    /// Blob id of the `TICKET_ID` entry.
    pub id: String,
    pub title: String,
    /// Epoch seconds, taken from the name.
    pub opened: i64,
    /// Free text: decode keeps whatever the branch holds.
    pub state: String,
    pub assigned: String,
    pub tags: BTreeSet<String>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

impl Ticket {
    /// First six characters of the id, as shown in listings.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..6).unwrap_or(&self.id)
    }

    /// Local part of the assignee's email.
    #[must_use]
    pub fn assigned_name(&self) -> &str {
        self.assigned
            .split_once('@')
            .map_or(self.assigned.as_str(), |(login, _)| login)
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_parse_case_insensitively() {
        assert_eq!("Resolved".parse::<TicketState>(), Ok(TicketState::Resolved));
        assert_eq!(" hold ".parse::<TicketState>(), Ok(TicketState::Hold));
        assert!("closed".parse::<TicketState>().is_err());
        for state in TicketState::ALL {
            assert_eq!(state.as_str().parse::<TicketState>(), Ok(state));
        }
    }

    #[test]
    fn assigned_name_is_email_login() {
        let mut ticket = Ticket {
            name: "1_x_1".into(),
            id: "abc".into(),
            title: "x".into(),
            opened: 1,
            state: "open".into(),
            assigned: "jdoe@example.com".into(),
            tags: BTreeSet::new(),
            comments: vec![],
            attachments: vec![],
        };
        assert_eq!(ticket.assigned_name(), "jdoe");
        assert_eq!(ticket.short_id(), "abc");
        ticket.assigned = "anon".into();
        assert_eq!(ticket.assigned_name(), "anon");
    }
}
