//! `ti state`: move a ticket to another state.

use crate::cmd::{not_found, render_changed};
use crate::output::OutputMode;
use clap::Args;
use tix_core::backend::TreeStore;
use tix_core::{Store, TicketState, TixError};

#[derive(Args, Debug)]
pub struct StateArgs {
    /// `[REF] STATE`: an optional ticket reference followed by one of
    /// open, resolved, invalid, hold.
    #[arg(required = true, num_args = 1..=2, value_name = "ARGS")]
    pub values: Vec<String>,
}

impl StateArgs {
    /// The reference (if any) and the requested state.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.values.as_slice() {
            [state] => (None, state.as_str()),
            [reference, state, ..] => (Some(reference.as_str()), state.as_str()),
            [] => (None, ""),
        }
    }
}

/// Execute `ti state [REF] STATE`.
///
/// # Errors
///
/// Unknown states or references, branch transaction failures, or output
/// failures.
pub fn run_state<S: TreeStore>(
    args: &StateArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let (reference, state) = args.split();
    let state: TicketState = state
        .parse()
        .map_err(|e: tix_core::model::ParseStateError| TixError::InvalidState(e.got))?;
    let ticket = store
        .change_state(reference, state)?
        .ok_or_else(|| not_found(reference))?;
    render_changed(output, "updated", &ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::store;
    use tempfile::TempDir;
    use tix_core::{CreateOptions, ErrorCode};

    fn args(values: &[&str]) -> StateArgs {
        StateArgs {
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn unknown_state_is_invalid_state() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Stateful", CreateOptions::default()).expect("create");
        let err = run_state(&args(&[&ticket.id, "closed"]), OutputMode::Json, &mut store)
            .expect_err("closed is not a state");
        let tix = err.downcast_ref::<TixError>().expect("tix error");
        assert_eq!(tix.code(), ErrorCode::InvalidState);
        assert_eq!(store.ticket(&ticket.name).expect("ticket").state, "open");
    }

    #[test]
    fn state_changes_by_reference() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Stateful", CreateOptions::default()).expect("create");
        run_state(&args(&[&ticket.id, "Hold"]), OutputMode::Json, &mut store).expect("state");
        assert_eq!(store.ticket(&ticket.name).expect("ticket").state, "hold");
    }
}
