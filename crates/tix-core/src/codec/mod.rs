//! Record codec: ticket branch tree ⇄ [`Ticket`] records.
//!
//! The branch holds one directory per ticket and one marker file per
//! attribute:
//!
//! ```text
//! .hold
//! 1206206148_add-attachment-to-ticket_138/
//!   TICKET_ID
//!   ASSIGNED_schacon@gmail.com
//!   STATE_open
//!   TAG_feature
//!   COMMENT_1206206148_schacon@gmail.com
//! ```
//!
//! [`decode`] groups a recursive tree listing into an [`Index`] of raw
//! buckets; [`hydrate`] turns buckets into tickets. Both fail with
//! [`TixError::FormatCorruption`] rather than skipping bad records.

pub mod marker;
pub mod name;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::backend::{BlobId, TreeEntry};
use crate::error::{Result, TixError};
use crate::model::ticket::{Attachment, Comment, Ticket};
pub use marker::{Marker, normalize};
pub use name::TicketName;

/// One marker entry of a ticket directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub file: String,
    pub blob: BlobId,
}

/// Raw entries of one ticket directory, in tree order.
pub type Bucket = Vec<MarkerEntry>;

/// Ticket name → raw bucket. Rebuilt wholesale after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    buckets: BTreeMap<String, Bucket>,
}

impl Index {
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[must_use]
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bucket)> {
        self.buckets.iter()
    }

    /// Blob id of the ticket's `TICKET_ID` entry.
    #[must_use]
    pub fn ticket_id(&self, name: &str) -> Option<&BlobId> {
        self.buckets
            .get(name)?
            .iter()
            .find(|e| e.file == marker::ID_FILE)
            .map(|e| &e.blob)
    }
}

/// Group a branch listing into an [`Index`].
///
/// Entries not exactly two levels deep are ignored, which tolerates stray
/// top-level files such as the `.hold` sentinel.
///
/// # Errors
///
/// [`TixError::FormatCorruption`] when a ticket directory name does not parse.
pub fn decode(entries: &[TreeEntry]) -> Result<Index> {
    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();

    for entry in entries {
        let mut parts = entry.path.split('/');
        let (Some(dir), Some(file), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if !buckets.contains_key(dir) {
            TicketName::parse(dir)?;
        }
        buckets.entry(dir.to_string()).or_default().push(MarkerEntry {
            file: file.to_string(),
            blob: entry.blob.clone(),
        });
    }

    tracing::trace!(tickets = buckets.len(), entries = entries.len(), "decoded ticket branch");
    Ok(Index { buckets })
}

/// Build the ticket stored under `name` from its raw bucket.
///
/// Duplicate `STATE_`/`ASSIGNED_` markers resolve to the last one seen.
///
/// # Errors
///
/// [`TixError::FormatCorruption`] for a bad name, a malformed marker or a
/// missing `TICKET_ID`.
pub fn decode_ticket(name: &str, bucket: &[MarkerEntry]) -> Result<Ticket> {
    let parsed = TicketName::parse(name)?;

    let mut id = None;
    let mut state = None;
    let mut assigned = None;
    let mut tags = BTreeSet::new();
    let mut comments = Vec::new();
    let mut attachments = Vec::new();

    for entry in bucket {
        match Marker::parse(&entry.file)? {
            Marker::Id => id = Some(entry.blob.as_str().to_string()),
            Marker::Assigned(email) => assigned = Some(email),
            Marker::State(value) => state = Some(value),
            Marker::Tag(tag) => {
                tags.insert(tag);
            }
            Marker::Comment { added, author } => comments.push(Comment {
                author,
                added,
                body: entry.blob.clone(),
            }),
            Marker::Attachment {
                added,
                author,
                filename,
            } => attachments.push(Attachment {
                author,
                added,
                filename,
                content: entry.blob.clone(),
            }),
            Marker::Unknown(file) => {
                tracing::debug!(ticket = name, file, "ignoring unknown marker");
            }
        }
    }

    let id = id.ok_or_else(|| TixError::corrupt(name, "missing TICKET_ID"))?;
    let state = state.unwrap_or_else(|| {
        tracing::debug!(ticket = name, "no STATE marker; treating as open");
        "open".to_string()
    });

    Ok(Ticket {
        name: name.to_string(),
        id,
        title: parsed.title(),
        opened: parsed.opened,
        state,
        assigned: assigned.unwrap_or_default(),
        tags,
        comments,
        attachments,
    })
}

/// Decode every ticket of the index, in index order.
///
/// # Errors
///
/// The first [`TixError::FormatCorruption`] encountered.
pub fn hydrate(index: &Index) -> Result<Vec<Ticket>> {
    index
        .iter()
        .map(|(name, bucket)| decode_ticket(name, bucket))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, blob: &str) -> TreeEntry {
        TreeEntry::new(path, BlobId::new(blob))
    }

    fn sample() -> Vec<TreeEntry> {
        vec![
            entry(".hold", "h0"),
            entry("1206206148_fix-login_138/TICKET_ID", "abc123def"),
            entry("1206206148_fix-login_138/ASSIGNED_a@x.io", "b1"),
            entry("1206206148_fix-login_138/STATE_open", "b2"),
            entry("1206206148_fix-login_138/TAG_backend", "b3"),
            entry("1206206148_fix-login_138/COMMENT_1206206200_a@x.io", "c1"),
            entry("1206206148_fix-login_138/COMMENT_1206206300_b@x.io", "c2"),
            entry(
                "1206206148_fix-login_138/ATTACHMENT_1206206400_b@x.io@@log.txt",
                "att",
            ),
            entry("1300000000_second_5/TICKET_ID", "fff000"),
            entry("1300000000_second_5/ASSIGNED_b@x.io", "b4"),
            entry("1300000000_second_5/STATE_hold", "b5"),
        ]
    }

    #[test]
    fn groups_entries_into_buckets() {
        let index = decode(&sample()).expect("decode");
        assert_eq!(index.len(), 2);
        let bucket = index.bucket("1206206148_fix-login_138").expect("bucket");
        assert_eq!(bucket.len(), 7);
        assert_eq!(bucket[0].file, "TICKET_ID");
        assert_eq!(
            index.ticket_id("1300000000_second_5").map(BlobId::as_str),
            Some("fff000")
        );
    }

    #[test]
    fn ignores_entries_at_other_depths() {
        let entries = vec![
            entry("README", "r"),
            entry("1_a_1/TICKET_ID", "i"),
            entry("1_a_1/nested/deeper", "d"),
        ];
        let index = decode(&entries).expect("decode");
        assert_eq!(index.bucket("1_a_1").map(Vec::len), Some(1));
    }

    #[test]
    fn bad_directory_name_is_corruption() {
        let entries = vec![entry("not-a-ticket/TICKET_ID", "i")];
        assert!(matches!(
            decode(&entries),
            Err(TixError::FormatCorruption { .. })
        ));
    }

    #[test]
    fn hydrates_full_ticket() {
        let index = decode(&sample()).expect("decode");
        let tickets = hydrate(&index).expect("hydrate");
        assert_eq!(tickets.len(), 2);

        let t = &tickets[0];
        assert_eq!(t.title, "fix login");
        assert_eq!(t.opened, 1_206_206_148);
        assert_eq!(t.id, "abc123def");
        assert_eq!(t.state, "open");
        assert_eq!(t.assigned, "a@x.io");
        assert!(t.has_tag("backend"));
        assert_eq!(t.comments.len(), 2);
        assert_eq!(t.comments[1].author, "b@x.io");
        assert_eq!(t.comments[1].body.as_str(), "c2");
        assert_eq!(t.attachments.len(), 1);
        assert_eq!(t.attachments[0].filename, "log.txt");

        assert_eq!(tickets[1].state, "hold");
    }

    #[test]
    fn duplicate_state_markers_last_wins() {
        let entries = vec![
            entry("1_a_1/TICKET_ID", "i"),
            entry("1_a_1/STATE_open", "s1"),
            entry("1_a_1/STATE_resolved", "s2"),
        ];
        let tickets = hydrate(&decode(&entries).expect("decode")).expect("hydrate");
        assert_eq!(tickets[0].state, "resolved");
    }

    #[test]
    fn missing_id_is_corruption() {
        let entries = vec![entry("1_a_1/STATE_open", "s")];
        let index = decode(&entries).expect("decode");
        assert!(matches!(
            hydrate(&index),
            Err(TixError::FormatCorruption { .. })
        ));
    }

    #[test]
    fn malformed_marker_fails_the_record() {
        let entries = vec![
            entry("1_a_1/TICKET_ID", "i"),
            entry("1_a_1/COMMENT_yesterday_a@x.io", "c"),
        ];
        let index = decode(&entries).expect("decode");
        assert!(hydrate(&index).is_err());
    }
}
