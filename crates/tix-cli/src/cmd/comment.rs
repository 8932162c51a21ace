//! `ti comment`: append a comment to a ticket.

use crate::cmd::{not_found, render_changed};
use crate::output::OutputMode;
use clap::Args;
use tix_core::Store;
use tix_core::backend::TreeStore;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Row number from the last listing or id prefix. Defaults to the
    /// checked-out ticket.
    pub reference: Option<String>,

    /// Comment body.
    #[arg(short, long)]
    pub message: String,
}

/// Execute `ti comment [REF] -m BODY`.
///
/// # Errors
///
/// Unknown references, branch transaction failures, or output failures.
pub fn run_comment<S: TreeStore>(
    args: &CommentArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let reference = args.reference.as_deref();
    let ticket = store
        .add_comment(reference, &args.message)?
        .ok_or_else(|| not_found(reference))?;
    render_changed(output, "commented", &ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::store;
    use tempfile::TempDir;
    use tix_core::CreateOptions;

    #[test]
    fn comments_the_checked_out_ticket() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Chatty", CreateOptions::default()).expect("create");
        store.checkout(Some(&ticket.id));

        let args = CommentArgs {
            reference: None,
            message: "looking into it".into(),
        };
        run_comment(&args, OutputMode::Json, &mut store).expect("comment");
        let comments = &store.show(None).expect("ticket").comments;
        assert_eq!(comments.len(), 1);
        assert_eq!(
            store.comment_body(&comments[0]).expect("body"),
            "looking into it"
        );
    }

    #[test]
    fn nothing_checked_out_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        store.create("Lonely", CreateOptions::default()).expect("create");
        let args = CommentArgs {
            reference: None,
            message: "hello?".into(),
        };
        let err = run_comment(&args, OutputMode::Json, &mut store).expect_err("no checkout");
        assert_eq!(err.to_string(), "no ticket is checked out");
    }
}
