//! `ti new`: open a ticket.

use crate::cmd::render_changed;
use crate::output::OutputMode;
use clap::Args;
use tix_core::backend::TreeStore;
use tix_core::{CreateOptions, Store};

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Ticket title.
    #[arg(short, long)]
    pub title: String,

    /// First comment.
    #[arg(short, long)]
    pub comment: Option<String>,

    /// Comma separated tags. May be repeated.
    #[arg(long)]
    pub tags: Vec<String>,
}

/// Execute `ti new`.
///
/// # Errors
///
/// A blank title, branch transaction failures, or output failures.
pub fn run_new<S: TreeStore>(
    args: NewArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let ticket = store.create(
        &args.title,
        CreateOptions {
            comment: args.comment,
            tags: args.tags,
        },
    )?;
    render_changed(output, "opened", &ticket)
}
