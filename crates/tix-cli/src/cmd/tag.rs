//! `ti tag`: add or remove comma separated tags.

use crate::cmd::{not_found, render_changed};
use crate::output::OutputMode;
use clap::Args;
use tix_core::Store;
use tix_core::backend::TreeStore;

#[derive(Args, Debug)]
pub struct TagArgs {
    /// `[REF] TAGS`: an optional ticket reference followed by a comma
    /// separated tag list. Without a reference the checked-out ticket is used.
    #[arg(required = true, num_args = 1..=2, value_name = "ARGS")]
    pub values: Vec<String>,

    /// Remove the tags instead of adding them.
    #[arg(short, long)]
    pub delete: bool,
}

impl TagArgs {
    /// The reference (if any) and the tag list.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.values.as_slice() {
            [tags] => (None, tags.as_str()),
            [reference, tags, ..] => (Some(reference.as_str()), tags.as_str()),
            [] => (None, ""),
        }
    }
}

/// Execute `ti tag [REF] TAGS [-d]`.
///
/// # Errors
///
/// Unknown references, branch transaction failures, or output failures.
pub fn run_tag<S: TreeStore>(
    args: &TagArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let (reference, tags) = args.split();
    let (changed, action) = if args.delete {
        (store.remove_tags(reference, tags)?, "untagged")
    } else {
        (store.add_tags(reference, tags)?, "tagged")
    };
    let ticket = changed.ok_or_else(|| not_found(reference))?;
    render_changed(output, action, &ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::store;
    use tempfile::TempDir;
    use tix_core::CreateOptions;

    fn args(values: &[&str], delete: bool) -> TagArgs {
        TagArgs {
            values: values.iter().map(ToString::to_string).collect(),
            delete,
        }
    }

    #[test]
    fn add_then_delete() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let ticket = store.create("Taggable", CreateOptions::default()).expect("create");
        let id = ticket.id.clone();

        run_tag(&args(&[&id, "Bug, ui"], false), OutputMode::Json, &mut store).expect("tag");
        let tags = &store.ticket(&ticket.name).expect("ticket").tags;
        assert!(tags.contains("bug") && tags.contains("ui"));

        store.checkout(Some(&id));
        run_tag(&args(&["ui"], true), OutputMode::Json, &mut store).expect("untag");
        let tags: Vec<&str> = store
            .ticket(&ticket.name)
            .expect("ticket")
            .tags
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tags, ["bug"]);
    }

    #[test]
    fn split_handles_optional_reference() {
        assert_eq!(args(&["a,b"], false).split(), (None, "a,b"));
        assert_eq!(args(&["2", "a"], false).split(), (Some("2"), "a"));
    }
}
