//! `ti recent`: latest commits on the ticket branch.

use crate::cmd::resolve_name;
use crate::output::{OutputMode, local_time, render_mode};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use tix_core::Store;
use tix_core::backend::{CommitSummary, TreeStore};

#[derive(Args, Debug)]
pub struct RecentArgs {
    /// Only commits touching this ticket (row number or id prefix).
    pub reference: Option<String>,

    /// Show at most this many commits.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct RecentOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket: Option<String>,
    commits: Vec<CommitSummary>,
}

/// Execute `ti recent [REF]`.
///
/// # Errors
///
/// Unknown references, history that cannot be read, or output failures.
pub fn run_recent<S: TreeStore>(
    args: &RecentArgs,
    output: OutputMode,
    store: &Store<S>,
) -> anyhow::Result<()> {
    let ticket = match args.reference.as_deref() {
        Some(reference) => Some(resolve_name(store, Some(reference))?),
        None => None,
    };
    let mut commits = store.recent(ticket.as_deref())?;
    commits.truncate(args.limit);
    let result = RecentOutput { ticket, commits };
    render_mode(output, &result, write_recent_text, write_recent_pretty)
}

fn short(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn write_recent_text(r: &RecentOutput, w: &mut dyn Write) -> io::Result<()> {
    for c in &r.commits {
        writeln!(w, "{}\t{}\t{}", short(&c.id), c.time, c.message)?;
    }
    Ok(())
}

fn write_recent_pretty(r: &RecentOutput, w: &mut dyn Write) -> io::Result<()> {
    if r.commits.is_empty() {
        return writeln!(w, "No ticket history.");
    }
    for c in &r.commits {
        writeln!(w, "{}  {}  {}", short(&c.id), local_time(c.time), c.message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str, time: i64, message: &str) -> CommitSummary {
        CommitSummary {
            id: id.into(),
            time,
            message: message.into(),
        }
    }

    #[test]
    fn text_rows_use_short_ids() {
        let out = RecentOutput {
            ticket: None,
            commits: vec![
                commit("0123456789abcdef", 20, "added comment to ticket t"),
                commit("fedcba9876543210", 10, "added ticket t"),
            ],
        };
        let mut buf = Vec::new();
        write_recent_text(&out, &mut buf).expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "0123456\t20\tadded comment to ticket t\nfedcba9\t10\tadded ticket t\n"
        );
    }

    #[test]
    fn empty_history_pretty() {
        let out = RecentOutput {
            ticket: None,
            commits: Vec::new(),
        };
        let mut buf = Vec::new();
        write_recent_pretty(&out, &mut buf).expect("write");
        assert_eq!(buf, b"No ticket history.\n");
    }
}
