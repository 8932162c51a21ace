//! Command handlers. Each module owns its clap args and rendering.

pub mod assign;
pub mod attach;
pub mod checkout;
pub mod comment;
pub mod list;
pub mod new;
pub mod recent;
pub mod saved;
pub mod show;
pub mod state;
pub mod tag;

use crate::output::{CliError, OutputMode, render_mode};
use anyhow::Context;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tix_core::backend::TreeStore;
use tix_core::backend::git::GitCli;
use tix_core::config::resolve_config;
use tix_core::{Store, StoreOptions, Ticket};

/// Open the ticket store for the repository enclosing `project_root`.
pub fn open_store(project_root: &Path, branch: Option<&str>) -> anyhow::Result<Store<GitCli>> {
    let config = resolve_config().context("loading tix configuration")?;
    let mut options = StoreOptions::from(config);
    if let Some(branch) = branch.filter(|b| !b.trim().is_empty()) {
        options = options.with_branch(branch);
    }
    Ok(Store::open(project_root, options)?)
}

/// Error for a reference that resolved to nothing.
pub fn not_found(reference: Option<&str>) -> anyhow::Error {
    let message = match reference.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reference) => format!("no ticket matches '{reference}'"),
        None => "no ticket is checked out".to_string(),
    };
    anyhow::Error::new(CliError::with_details(
        message,
        "run `ti list` and refer to a ticket by row number or id prefix",
        "ticket_not_found",
    ))
}

/// Resolve `reference` to a ticket name or fail with [`not_found`].
pub fn resolve_name<S: TreeStore>(
    store: &Store<S>,
    reference: Option<&str>,
) -> anyhow::Result<String> {
    store.resolve(reference).ok_or_else(|| not_found(reference))
}

/// Result of a command that changed one ticket.
#[derive(Debug, Serialize)]
pub struct Changed<'a> {
    pub ok: bool,
    pub action: &'static str,
    pub ticket: &'a Ticket,
}

pub fn render_changed(output: OutputMode, action: &'static str, ticket: &Ticket) -> anyhow::Result<()> {
    let changed = Changed {
        ok: true,
        action,
        ticket,
    };
    render_mode(output, &changed, write_changed_text, write_changed_pretty)
}

fn write_changed_text(changed: &Changed<'_>, w: &mut dyn Write) -> io::Result<()> {
    let t = changed.ticket;
    writeln!(w, "{}\t{}\t{}\t{}", changed.action, t.short_id(), t.state, t.title)
}

fn write_changed_pretty(changed: &Changed<'_>, w: &mut dyn Write) -> io::Result<()> {
    let t = changed.ticket;
    writeln!(w, "✓ {} {}  {}", changed.action, t.short_id(), t.title)
}

/// Comma separated tags for display.
pub fn join_tags(ticket: &Ticket) -> String {
    ticket.tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
