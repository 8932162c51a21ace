//! `ti list`: filtered, ordered ticket listings and saved queries.
//!
//! Row numbers printed here are what `ti show 2` and friends refer to.

use crate::output::{OutputMode, local_date, pretty_rule, render_mode};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use tix_core::backend::TreeStore;
use tix_core::query::QueryOptions;
use tix_core::{ListOutcome, Store, Ticket};

const TITLE_WIDTH: usize = 32;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Replay the saved query with this name.
    pub saved: Option<String>,

    /// Sort by `assigned`, `state` or `date`; append `.desc` to reverse.
    #[arg(short, long)]
    pub order: Option<String>,

    /// Only tickets carrying this tag.
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Regular expression matched against the state.
    #[arg(short, long)]
    pub state: Option<String>,

    /// Regular expression matched against the assignee.
    #[arg(short, long)]
    pub assigned: Option<String>,

    /// Save these options under a name.
    #[arg(short = 'S', long)]
    pub save: Option<String>,
}

impl From<ListArgs> for QueryOptions {
    fn from(args: ListArgs) -> Self {
        Self {
            order: args.order,
            tag: args.tag,
            state: args.state,
            assigned: args.assigned,
            save: args.save,
            saved: args.saved,
        }
    }
}

/// One listing row.
#[derive(Debug, Serialize)]
pub struct ListRow {
    /// 1-based row number, usable as a reference.
    pub position: usize,
    pub current: bool,
    pub id: String,
    pub name: String,
    pub title: String,
    pub state: String,
    pub assigned: String,
    /// Local part of `assigned`, for the pretty table.
    #[serde(skip)]
    pub login: String,
    pub opened: i64,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListView {
    pub tickets: Vec<ListRow>,
    pub options: QueryOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_as: Option<String>,
}

fn row(position: usize, ticket: &Ticket, current: Option<&str>) -> ListRow {
    ListRow {
        position,
        current: current == Some(ticket.name.as_str()),
        id: ticket.id.clone(),
        name: ticket.name.clone(),
        title: ticket.title.clone(),
        state: ticket.state.clone(),
        assigned: ticket.assigned.clone(),
        login: ticket.assigned_name().to_string(),
        opened: ticket.opened,
        tags: ticket.tags.iter().cloned().collect(),
    }
}

fn view(outcome: ListOutcome, current: Option<&str>) -> ListView {
    ListView {
        tickets: outcome
            .tickets
            .iter()
            .enumerate()
            .map(|(i, t)| row(i + 1, t, current))
            .collect(),
        options: outcome.options,
        saved_as: outcome.saved_as,
    }
}

/// Execute `ti list`.
///
/// # Errors
///
/// Invalid filter patterns, settings that cannot be saved, or output failures.
pub fn run_list<S: TreeStore>(
    args: ListArgs,
    output: OutputMode,
    store: &mut Store<S>,
) -> anyhow::Result<()> {
    let outcome = store.list(QueryOptions::from(args))?;
    let current = store.current_ticket().map(str::to_string);
    let view = view(outcome, current.as_deref());
    render_mode(output, &view, write_list_text, write_list_pretty)
}

fn short(id: &str) -> &str {
    id.get(..6).unwrap_or(id)
}

fn clip(title: &str) -> String {
    if title.chars().count() <= TITLE_WIDTH {
        title.to_string()
    } else {
        let head: String = title.chars().take(TITLE_WIDTH - 1).collect();
        format!("{head}…")
    }
}

fn write_list_text(view: &ListView, w: &mut dyn Write) -> io::Result<()> {
    for r in &view.tickets {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.position,
            short(&r.id),
            r.state,
            local_date(r.opened),
            r.assigned,
            r.tags.join(","),
            r.title
        )?;
    }
    Ok(())
}

fn write_list_pretty(view: &ListView, w: &mut dyn Write) -> io::Result<()> {
    if view.tickets.is_empty() {
        writeln!(w, "No tickets.")?;
    } else {
        writeln!(
            w,
            "  {:>3} {:<6} {:<width$} {:<8} {:<10} {:<10} Tags",
            "#",
            "TicId",
            "Title",
            "State",
            "Date",
            "Assgn",
            width = TITLE_WIDTH
        )?;
        pretty_rule(w)?;
        for r in &view.tickets {
            writeln!(
                w,
                "{} {:>3} {:<6} {:<width$} {:<8} {:<10} {:<10} {}",
                if r.current { '*' } else { ' ' },
                r.position,
                short(&r.id),
                clip(&r.title),
                r.state,
                local_date(r.opened),
                r.login,
                r.tags.join(","),
                width = TITLE_WIDTH
            )?;
        }
    }
    if let Some(name) = &view.saved_as {
        writeln!(w)?;
        writeln!(w, "saved query '{name}'")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::test_support::{ME, store};
    use tempfile::TempDir;
    use tix_core::{CreateOptions, TicketState};

    fn render_text(view: &ListView) -> String {
        let mut buf = Vec::new();
        write_list_text(view, &mut buf).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    fn render_pretty(view: &ListView) -> String {
        let mut buf = Vec::new();
        write_list_pretty(view, &mut buf).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn args_become_query_options() {
        let options = QueryOptions::from(ListArgs {
            saved: Some("mine".into()),
            order: Some("state".into()),
            tag: None,
            state: Some("open".into()),
            assigned: None,
            save: None,
        });
        assert_eq!(options.saved.as_deref(), Some("mine"));
        assert_eq!(options.order.as_deref(), Some("state"));
        assert_eq!(options.state.as_deref(), Some("open"));
        assert!(!options.is_empty());
    }

    #[test]
    fn rows_are_numbered_and_mark_current() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let first = store.create("First", CreateOptions::default()).expect("create");
        let second = store
            .create(
                "Second",
                CreateOptions {
                    comment: None,
                    tags: vec!["ui".into()],
                },
            )
            .expect("create");
        store.checkout(Some(&second.id));

        let outcome = store.list(QueryOptions::default()).expect("list");
        let view = view(outcome, store.current_ticket());
        assert_eq!(view.tickets.len(), 2);
        let positions: Vec<usize> = view.tickets.iter().map(|r| r.position).collect();
        assert_eq!(positions, [1, 2]);
        let current: Vec<bool> = view.tickets.iter().map(|r| r.current).collect();
        let second_at = view
            .tickets
            .iter()
            .position(|r| r.name == second.name)
            .expect("second listed");
        assert!(current[second_at]);
        assert_eq!(current.iter().filter(|c| **c).count(), 1);

        let text = render_text(&view);
        assert!(text.contains(&format!("\t{}\topen\t", short(&first.id))));
        assert!(text.contains(&format!("\t{ME}\tui\tsecond\n")));

        let pretty = render_pretty(&view);
        assert!(pretty.contains("TicId"));
        assert!(pretty.lines().any(|l| l.starts_with('*') && l.contains("second")));
        assert!(pretty.contains(" dev "));
        assert!(!pretty.contains(ME));
    }

    #[test]
    fn default_listing_hides_closed_tickets() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let done = store.create("Done", CreateOptions::default()).expect("create");
        store
            .change_state(Some(&done.id), TicketState::Resolved)
            .expect("state");

        let outcome = store.list(QueryOptions::default()).expect("list");
        let view = view(outcome, None);
        assert!(view.tickets.is_empty());
        assert_eq!(render_pretty(&view), "No tickets.\n");
        assert_eq!(render_text(&view), "");
    }

    #[test]
    fn saved_query_is_announced() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = store(&tmp);
        let outcome = store
            .list(QueryOptions {
                state: Some(".".into()),
                save: Some("all".into()),
                ..QueryOptions::default()
            })
            .expect("list");
        let view = view(outcome, None);
        assert!(render_pretty(&view).ends_with("saved query 'all'\n"));
        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(json["saved_as"], "all");
        assert_eq!(json["options"]["state"], ".");
    }

    #[test]
    fn long_titles_are_clipped() {
        let title = "x".repeat(TITLE_WIDTH + 5);
        let clipped = clip(&title);
        assert_eq!(clipped.chars().count(), TITLE_WIDTH);
        assert!(clipped.ends_with('…'));
        assert_eq!(clip("short"), "short");
    }
}
