//! `ti saved`: list saved list queries.

use crate::output::{OutputMode, render_mode};
use clap::Args;
use std::collections::BTreeMap;
use std::io::{self, Write};
use tix_core::Store;
use tix_core::backend::TreeStore;
use tix_core::query::QueryOptions;

#[derive(Args, Debug)]
pub struct SavedArgs {}

/// Execute `ti saved`.
///
/// # Errors
///
/// Output failures.
pub fn run_saved<S: TreeStore>(
    _args: &SavedArgs,
    output: OutputMode,
    store: &Store<S>,
) -> anyhow::Result<()> {
    render_mode(
        output,
        &store.settings().list_options,
        write_saved_text,
        write_saved_pretty,
    )
}

fn describe(options: &QueryOptions) -> String {
    [
        ("order", &options.order),
        ("tag", &options.tag),
        ("state", &options.state),
        ("assigned", &options.assigned),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}")))
    .collect::<Vec<_>>()
    .join(" ")
}

fn write_saved_text(saved: &BTreeMap<String, QueryOptions>, w: &mut dyn Write) -> io::Result<()> {
    for (name, options) in saved {
        writeln!(w, "{name}\t{}", describe(options))?;
    }
    Ok(())
}

fn write_saved_pretty(
    saved: &BTreeMap<String, QueryOptions>,
    w: &mut dyn Write,
) -> io::Result<()> {
    if saved.is_empty() {
        return writeln!(w, "No saved queries. Save one with `ti list ... --save NAME`.");
    }
    for (name, options) in saved {
        writeln!(w, "{name:<16} {}", describe(options))?;
    }
    Ok(())
}
