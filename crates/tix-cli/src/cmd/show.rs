//! `ti show`: full details of one ticket, comment bodies included.

use crate::cmd::resolve_name;
use crate::output::{
    OutputMode, local_time, pretty_kv, pretty_rule, pretty_section, render_mode,
};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use tix_core::backend::TreeStore;
use tix_core::{Store, Ticket};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Row number from the last listing or id prefix. Defaults to the
    /// checked-out ticket.
    pub reference: Option<String>,
}

/// Full ticket detail as returned in JSON output.
#[derive(Debug, Serialize)]
pub struct ShowTicket {
    pub id: String,
    pub name: String,
    pub title: String,
    pub state: String,
    pub assigned: String,
    pub opened: i64,
    pub tags: Vec<String>,
    pub current: bool,
    pub comments: Vec<ShowComment>,
    pub attachments: Vec<ShowAttachment>,
}

#[derive(Debug, Serialize)]
pub struct ShowComment {
    pub author: String,
    pub added: i64,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ShowAttachment {
    pub filename: String,
    pub author: String,
    pub added: i64,
}

fn detail<S: TreeStore>(store: &Store<S>, ticket: &Ticket) -> anyhow::Result<ShowTicket> {
    let comments = ticket
        .comments
        .iter()
        .map(|c| {
            Ok(ShowComment {
                author: c.author.clone(),
                added: c.added,
                body: store.comment_body(c)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(ShowTicket {
        id: ticket.id.clone(),
        name: ticket.name.clone(),
        title: ticket.title.clone(),
        state: ticket.state.clone(),
        assigned: ticket.assigned.clone(),
        opened: ticket.opened,
        tags: ticket.tags.iter().cloned().collect(),
        current: store.current_ticket() == Some(ticket.name.as_str()),
        comments,
        attachments: ticket
            .attachments
            .iter()
            .map(|a| ShowAttachment {
                filename: a.filename.clone(),
                author: a.author.clone(),
                added: a.added,
            })
            .collect(),
    })
}

/// Execute `ti show [REF]`.
///
/// # Errors
///
/// Unknown references, unreadable comment blobs, or output failures.
pub fn run_show<S: TreeStore>(
    args: &ShowArgs,
    output: OutputMode,
    store: &Store<S>,
) -> anyhow::Result<()> {
    let name = resolve_name(store, args.reference.as_deref())?;
    let ticket = store
        .ticket(&name)
        .ok_or_else(|| crate::cmd::not_found(args.reference.as_deref()))?;
    let detail = detail(store, ticket)?;
    render_mode(output, &detail, write_show_text, write_show_pretty)
}

fn write_show_pretty(t: &ShowTicket, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Ticket {}", t.id))?;
    writeln!(w, "{}", t.title)?;
    pretty_rule(w)?;
    pretty_kv(w, "name", &t.name)?;
    pretty_kv(w, "state", t.state.to_uppercase())?;
    pretty_kv(w, "assigned", &t.assigned)?;
    pretty_kv(w, "opened", local_time(t.opened))?;
    if !t.tags.is_empty() {
        pretty_kv(w, "tags", t.tags.join(", "))?;
    }
    if t.current {
        pretty_kv(w, "checkout", "yes")?;
    }

    if !t.attachments.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Attachments ({})", t.attachments.len()))?;
        for a in &t.attachments {
            writeln!(w, "{}  ({}, {})", a.filename, a.author, local_time(a.added))?;
        }
    }

    if !t.comments.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Comments ({})", t.comments.len()))?;
        for (i, c) in t.comments.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            writeln!(w, "[{}] {}", local_time(c.added), c.author)?;
            for line in c.body.lines() {
                writeln!(w, "  {line}")?;
            }
        }
    }
    Ok(())
}

fn write_show_text(t: &ShowTicket, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "id\t{}", t.id)?;
    writeln!(w, "name\t{}", t.name)?;
    writeln!(w, "title\t{}", t.title)?;
    writeln!(w, "state\t{}", t.state)?;
    writeln!(w, "assigned\t{}", t.assigned)?;
    writeln!(w, "opened\t{}", t.opened)?;
    writeln!(w, "tags\t{}", t.tags.join(","))?;
    for a in &t.attachments {
        writeln!(w, "attachment\t{}\t{}\t{}", a.added, a.author, a.filename)?;
    }
    for c in &t.comments {
        writeln!(w, "comment\t{}\t{}\t{}", c.added, c.author, c.body.replace('\n', "\\n"))?;
    }
    Ok(())
}
