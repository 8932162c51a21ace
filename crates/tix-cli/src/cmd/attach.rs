//! `ti attach`: store a copy of a file with a ticket.

use crate::cmd::{not_found, render_changed};
use crate::output::OutputMode;
use clap::Args;
use std::path::PathBuf;
use tix_core::Store;
use tix_core::backend::TreeStore;

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Row number from the last listing or id prefix. Defaults to the
    /// checked-out ticket.
    pub reference: Option<String>,

    /// File to attach.
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Execute `ti attach [REF] -f FILE`.
///
/// # Errors
///
/// Unknown references, unreadable files, branch transaction failures, or
/// output failures.
pub fn run_attach<S: TreeStore>(
    args: &AttachArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let reference = args.reference.as_deref();
    let ticket = store
        .add_attachment(reference, &args.file)?
        .ok_or_else(|| not_found(reference))?;
    render_changed(output, "attached", &ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::store;
    use tempfile::TempDir;
    use tix_core::{CreateOptions, ErrorCode, TixError};

    #[test]
    fn attaches_file_contents() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Crashy", CreateOptions::default()).expect("create");
        let log = tmp.path().join("crash.log");
        std::fs::write(&log, b"panic at line 3\n").expect("write log");

        let args = AttachArgs {
            reference: Some(ticket.id.clone()),
            file: log,
        };
        run_attach(&args, OutputMode::Json, &mut store).expect("attach");
        let attachments = &store.ticket(&ticket.name).expect("ticket").attachments;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "crash.log");
        assert_eq!(
            store.attachment_content(&attachments[0]).expect("content"),
            b"panic at line 3\n"
        );
    }

    #[test]
    fn missing_file_is_a_local_io_error() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Crashy", CreateOptions::default()).expect("create");
        let args = AttachArgs {
            reference: Some(ticket.id.clone()),
            file: tmp.path().join("missing.log"),
        };
        let err = run_attach(&args, OutputMode::Json, &mut store).expect_err("missing file");
        let tix = err.downcast_ref::<TixError>().expect("tix error");
        assert_eq!(tix.code(), ErrorCode::LocalStateWriteFailed);
        assert!(store.ticket(&ticket.name).expect("ticket").attachments.is_empty());
    }
}
