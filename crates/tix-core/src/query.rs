//! Ticket list queries: filter, sort, save.
//!
//! Pure over a decoded ticket slice. Recording the result order for
//! positional references is the store's job.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TixError};
use crate::model::ticket::Ticket;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Field a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Assigned,
    State,
    /// The ticket's opened time.
    Date,
}

/// `<field>` or `<field>.desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortKey {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            descending: false,
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = s.split_once('.').unwrap_or((s, ""));
        let field = match field.trim().to_ascii_lowercase().as_str() {
            "assigned" => SortField::Assigned,
            "state" => SortField::State,
            "date" => SortField::Date,
            other => return Err(format!("unknown order field '{other}'")),
        };
        Ok(Self {
            field,
            descending: direction.eq_ignore_ascii_case("desc"),
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            SortField::Assigned => "assigned",
            SortField::State => "state",
            SortField::Date => "date",
        };
        if self.descending {
            write!(f, "{field}.desc")
        } else {
            f.write_str(field)
        }
    }
}

impl SortKey {
    fn compare(self, a: &Ticket, b: &Ticket) -> Ordering {
        match self.field {
            SortField::Assigned => a.assigned.cmp(&b.assigned),
            SortField::State => a.state.cmp(&b.state),
            SortField::Date => a.opened.cmp(&b.opened),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for a ticket listing.
///
/// `order`, `tag`, `state` and `assigned` are persisted when a query is
/// saved; `save` and `saved` are directives and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// `assigned`, `state` or `date`, optionally suffixed `.desc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Exact membership in the normalized tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Regular expression tested against the state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Regular expression tested against the assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned: Option<String>,
    /// Save the effective options under this name.
    #[serde(skip)]
    pub save: Option<String>,
    /// Replay the saved options with this name.
    #[serde(skip)]
    pub saved: Option<String>,
}

impl QueryOptions {
    /// True when no option at all was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.order.is_none()
            && self.tag.is_none()
            && self.state.is_none()
            && self.assigned.is_none()
            && self.save.is_none()
            && self.saved.is_none()
    }

    /// Fill unset fields from `saved`. Fields set on `self` win.
    #[must_use]
    pub fn merged_under(self, saved: &Self) -> Self {
        Self {
            order: self.order.or_else(|| saved.order.clone()),
            tag: self.tag.or_else(|| saved.tag.clone()),
            state: self.state.or_else(|| saved.state.clone()),
            assigned: self.assigned.or_else(|| saved.assigned.clone()),
            save: self.save,
            saved: self.saved,
        }
    }

    /// The options minus the `save`/`saved` directives.
    #[must_use]
    pub fn without_directives(&self) -> Self {
        Self {
            save: None,
            saved: None,
            ..self.clone()
        }
    }
}

fn compile(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|source| TixError::InvalidPattern {
                field,
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}

/// Filter and order `tickets`.
///
/// With no options at all, only `open` tickets are returned. Without an
/// order, tickets are sorted by opened time ascending. Unknown order fields
/// fall back to that default.
///
/// # Errors
///
/// [`TixError::InvalidPattern`] when `state` or `assigned` is not a valid
/// regular expression.
pub fn query<'a>(tickets: &'a [Ticket], options: &QueryOptions) -> Result<Vec<&'a Ticket>> {
    let state_pattern = if options.is_empty() {
        Some("open")
    } else {
        options.state.as_deref()
    };
    let state_re = compile("state", state_pattern)?;
    let assigned_re = compile("assigned", options.assigned.as_deref())?;

    let key = match options.order.as_deref().map(str::parse::<SortKey>) {
        Some(Ok(key)) => key,
        Some(Err(reason)) => {
            tracing::debug!(reason, "ignoring order option");
            SortKey::default()
        }
        None => SortKey::default(),
    };

    let mut out: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| options.tag.as_deref().is_none_or(|tag| t.has_tag(tag)))
        .filter(|t| state_re.as_ref().is_none_or(|re| re.is_match(&t.state)))
        .filter(|t| assigned_re.as_ref().is_none_or(|re| re.is_match(&t.assigned)))
        .collect();

    out.sort_by(|a, b| key.compare(a, b));
    if key.descending {
        out.reverse();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn ticket(name: &str, opened: i64, state: &str, assigned: &str, tags: &[&str]) -> Ticket {
        Ticket {
            name: name.into(),
            id: format!("id-{name}"),
            title: name.into(),
            opened,
            state: state.into(),
            assigned: assigned.into(),
            tags: tags.iter().map(|t| (*t).to_string()).collect::<BTreeSet<_>>(),
            comments: vec![],
            attachments: vec![],
        }
    }

    fn fixture() -> Vec<Ticket> {
        vec![
            ticket("t3", 300, "open", "carol@x.io", &["backend"]),
            ticket("t1", 100, "open", "alice@x.io", &[]),
            ticket("t2", 200, "resolved", "bob@x.io", &["backend", "ui"]),
            ticket("t4", 400, "hold", "alice@x.io", &["ui"]),
        ]
    }

    fn names(found: &[&Ticket]) -> Vec<String> {
        found.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn default_query_lists_open_by_date() {
        let tickets = fixture();
        let found = query(&tickets, &QueryOptions::default()).expect("query");
        assert_eq!(names(&found), vec!["t1", "t3"]);
    }

    #[test]
    fn any_option_disables_implicit_open_filter() {
        let tickets = fixture();
        let opts = QueryOptions {
            order: Some("date".into()),
            ..QueryOptions::default()
        };
        let found = query(&tickets, &opts).expect("query");
        assert_eq!(names(&found), vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn descending_order_reverses() {
        let tickets = fixture();
        let opts = QueryOptions {
            order: Some("date.desc".into()),
            ..QueryOptions::default()
        };
        let found = query(&tickets, &opts).expect("query");
        assert_eq!(names(&found), vec!["t4", "t3", "t2", "t1"]);
    }

    #[test]
    fn orders_by_assigned_and_state() {
        let tickets = fixture();
        let by_assigned = query(
            &tickets,
            &QueryOptions {
                order: Some("assigned".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert_eq!(names(&by_assigned), vec!["t1", "t4", "t2", "t3"]);

        let by_state = query(
            &tickets,
            &QueryOptions {
                order: Some("state".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert_eq!(names(&by_state), vec!["t4", "t3", "t1", "t2"]);
    }

    #[test]
    fn state_and_assigned_match_as_substrings() {
        let tickets = fixture();
        let found = query(
            &tickets,
            &QueryOptions {
                state: Some("ol".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert_eq!(names(&found), vec!["t2", "t4"]);

        let found = query(
            &tickets,
            &QueryOptions {
                assigned: Some("^alice".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert_eq!(names(&found), vec!["t1", "t4"]);
    }

    #[test]
    fn tag_filter_is_exact_membership() {
        let tickets = fixture();
        let found = query(
            &tickets,
            &QueryOptions {
                tag: Some("backend".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert_eq!(names(&found), vec!["t2", "t3"]);

        let none = query(
            &tickets,
            &QueryOptions {
                tag: Some("back".into()),
                ..QueryOptions::default()
            },
        )
        .expect("query");
        assert!(none.is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let tickets = fixture();
        let err = query(
            &tickets,
            &QueryOptions {
                state: Some("(".into()),
                ..QueryOptions::default()
            },
        )
        .expect_err("bad regex");
        assert!(matches!(err, TixError::InvalidPattern { field: "state", .. }));
    }

    #[test]
    fn caller_options_win_over_saved() {
        let saved = QueryOptions {
            tag: Some("ui".into()),
            state: Some("hold".into()),
            ..QueryOptions::default()
        };
        let caller = QueryOptions {
            state: Some("open".into()),
            saved: Some("mine".into()),
            ..QueryOptions::default()
        };
        let merged = caller.merged_under(&saved);
        assert_eq!(merged.tag.as_deref(), Some("ui"));
        assert_eq!(merged.state.as_deref(), Some("open"));
        assert_eq!(merged.saved.as_deref(), Some("mine"));
        assert!(merged.without_directives().saved.is_none());
    }

    #[test]
    fn sort_keys_parse_and_display() {
        let key: SortKey = "state.desc".parse().expect("parse");
        assert_eq!(key.field, SortField::State);
        assert!(key.descending);
        assert_eq!(key.to_string(), "state.desc");
        assert!("priority".parse::<SortKey>().is_err());
    }
}
