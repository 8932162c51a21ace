#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ti: tickets on a dedicated git branch",
    long_about = None
)]
struct Cli {
    /// Output format (pretty when stdout is a terminal, text otherwise).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Ticket branch to use instead of the configured one.
    #[arg(long, global = true)]
    branch: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags and environment.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List tickets",
        long_about = "List tickets with optional filters and sort order. With no options only open tickets are shown.",
        after_help = "EXAMPLES:\n    # Open tickets, oldest first\n    ti list\n\n    # Everything assigned to alice, newest first\n    ti list --state . --assigned alice --order date.desc\n\n    # Save a query and replay it later\n    ti list --tag bug --save bugs\n    ti list bugs"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one ticket",
        long_about = "Show full details for a ticket, including comment bodies.",
        after_help = "EXAMPLES:\n    # The checked-out ticket\n    ti show\n\n    # Second row of the last listing\n    ti show 2\n\n    # By id prefix\n    ti show 4fa2c1"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Open a new ticket",
        long_about = "Open a new ticket assigned to you, in a single commit on the ticket branch.",
        after_help = "EXAMPLES:\n    # Create a ticket\n    ti new --title \"Fix login timeout\"\n\n    # With a first comment and tags\n    ti new -t \"Fix login timeout\" -c \"seen on staging\" --tags bug,auth"
    )]
    New(cmd::new::NewArgs),

    #[command(
        next_help_heading = "Lifecycle",
        alias = "co",
        about = "Make a ticket the default for later commands",
        after_help = "EXAMPLES:\n    # Check out the first ticket of the last listing\n    ti checkout 1\n\n    # Short alias\n    ti co 1"
    )]
    Checkout(cmd::checkout::CheckoutArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Comment on a ticket",
        after_help = "EXAMPLES:\n    # Comment on the checked-out ticket\n    ti comment -m \"root cause found\"\n\n    # Comment on a listed ticket\n    ti comment 3 -m \"duplicate of 1\""
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Add or remove tags",
        long_about = "Add comma separated tags to a ticket, or remove them with --delete.",
        after_help = "EXAMPLES:\n    # Tag the checked-out ticket\n    ti tag bug,urgent\n\n    # Remove a tag from ticket 2\n    ti tag 2 urgent --delete"
    )]
    Tag(cmd::tag::TagArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change a ticket's state",
        long_about = "Move a ticket to one of: open, resolved, invalid, hold.",
        after_help = "EXAMPLES:\n    # Resolve the checked-out ticket\n    ti state resolved\n\n    # Put ticket 4 on hold\n    ti state 4 hold"
    )]
    State(cmd::state::StateArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Assign a ticket",
        long_about = "Assign a ticket to a user, or to yourself when --user is omitted.",
        after_help = "EXAMPLES:\n    # Take the checked-out ticket\n    ti assign\n\n    # Hand ticket 2 to bob\n    ti assign 2 --user bob@example.com"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Attach a file to a ticket",
        after_help = "EXAMPLES:\n    # Attach a log to ticket 1\n    ti attach 1 --file crash.log"
    )]
    Attach(cmd::attach::AttachArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show recent ticket branch history",
        after_help = "EXAMPLES:\n    # Everything\n    ti recent\n\n    # Only commits touching ticket 2\n    ti recent 2"
    )]
    Recent(cmd::recent::RecentArgs),

    #[command(
        next_help_heading = "Read",
        about = "List saved queries",
        after_help = "EXAMPLES:\n    # Names and options of saved list queries\n    ti saved"
    )]
    Saved(cmd::saved::SavedArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIX_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ti=debug,tix_core=debug,info"
        } else {
            "ti=info,tix_core=info,warn"
        })
    });

    let format = env::var("TIX_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let mut store = cmd::open_store(&project_root, cli.branch.as_deref())?;

    match cli.command {
        Commands::List(args) => cmd::list::run_list(args, output, &mut store),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &store),
        Commands::New(args) => cmd::new::run_new(args, output, &mut store),
        Commands::Checkout(ref args) => cmd::checkout::run_checkout(args, output, &mut store),
        Commands::Comment(ref args) => cmd::comment::run_comment(args, output, &mut store),
        Commands::Tag(ref args) => cmd::tag::run_tag(args, output, &mut store),
        Commands::State(ref args) => cmd::state::run_state(args, output, &mut store),
        Commands::Assign(ref args) => cmd::assign::run_assign(args, output, &mut store),
        Commands::Attach(ref args) => cmd::attach::run_attach(args, output, &mut store),
        Commands::Recent(ref args) => cmd::recent::run_recent(args, output, &store),
        Commands::Saved(ref args) => cmd::saved::run_saved(args, output, &store),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("command failed: {err:#}");
            let rendered = output::render_error(output, &CliError::from(&err));
            if rendered.is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
