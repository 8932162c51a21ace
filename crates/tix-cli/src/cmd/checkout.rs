//! `ti checkout`: set the default ticket for later commands.

use crate::cmd::not_found;
use crate::output::{OutputMode, render_mode};
use clap::Args;
use serde::Serialize;
use tix_core::Store;
use tix_core::backend::TreeStore;

#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Row number from the last listing or id prefix.
    pub reference: String,
}

#[derive(Debug, Serialize)]
struct CheckoutOutput {
    ok: bool,
    id: String,
    name: String,
    title: String,
}

/// Execute `ti checkout REF`.
///
/// # Errors
///
/// Unknown references or output failures.
pub fn run_checkout<S: TreeStore>(
    args: &CheckoutArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let name = store
        .checkout(Some(&args.reference))
        .ok_or_else(|| not_found(Some(&args.reference)))?;
    let ticket = store.ticket(&name).ok_or_else(|| not_found(Some(&args.reference)))?;
    let result = CheckoutOutput {
        ok: true,
        id: ticket.id.clone(),
        name: ticket.name.clone(),
        title: ticket.title.clone(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\t{}", r.id, r.title),
        |r, w| writeln!(w, "✓ checked out {}  {}", r.id.get(..6).unwrap_or(&r.id), r.title),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::{id_prefix, store};
    use tempfile::TempDir;
    use tix_core::CreateOptions;

    #[test]
    fn checkout_moves_the_default() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Pick me", CreateOptions::default()).expect("create");
        let args = CheckoutArgs {
            reference: id_prefix(&ticket.id, 10).to_string(),
        };
        run_checkout(&args, OutputMode::Json, &mut store).expect("checkout");
        assert_eq!(store.current_ticket(), Some(ticket.name.as_str()));
    }

    #[test]
    fn unknown_reference_keeps_previous_default() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Keep me", CreateOptions::default()).expect("create");
        store.checkout(Some(&ticket.id));

        let args = CheckoutArgs {
            reference: "42".into(),
        };
        assert!(run_checkout(&args, OutputMode::Json, &mut store).is_err());
        assert_eq!(store.current_ticket(), Some(ticket.name.as_str()));
    }
}
