//! `ti assign`: hand a ticket to someone, or take it.

use crate::cmd::{not_found, render_changed};
use crate::output::OutputMode;
use clap::Args;
use tix_core::Store;
use tix_core::backend::TreeStore;

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Row number from the last listing or id prefix. Defaults to the
    /// checked-out ticket.
    pub reference: Option<String>,

    /// Assignee. Defaults to your git `user.email`.
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Execute `ti assign [REF] [-u USER]`.
///
/// # Errors
///
/// Unknown references, branch transaction failures, or output failures.
pub fn run_assign<S: TreeStore>(
    args: &AssignArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let reference = args.reference.as_deref();
    let ticket = store
        .assign(reference, args.user.as_deref())?
        .ok_or_else(|| not_found(reference))?;
    render_changed(output, "assigned", &ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::{ME, store};
    use tempfile::TempDir;
    use tix_core::CreateOptions;

    #[test]
    fn assign_to_other_then_back_to_self() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Hot potato", CreateOptions::default()).expect("create");

        let to_bob = AssignArgs {
            reference: Some(ticket.id.clone()),
            user: Some("bob@example.com".into()),
        };
        run_assign(&to_bob, OutputMode::Json, &mut store).expect("assign bob");
        assert_eq!(
            store.ticket(&ticket.name).expect("ticket").assigned,
            "bob@example.com"
        );

        let to_me = AssignArgs {
            reference: Some(ticket.id.clone()),
            user: None,
        };
        run_assign(&to_me, OutputMode::Json, &mut store).expect("assign self");
        assert_eq!(store.ticket(&ticket.name).expect("ticket").assigned, ME);
    }
}
