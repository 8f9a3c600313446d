#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use metas_core::clock::SystemClock;
use metas_core::config;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "metas: indicator targets and monthly submissions",
    long_about = None
)]
struct Cli {
    /// Enable debug logging and detailed reports.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Store file (default: .metas/metas.db).
    #[arg(long, global = true, env = "METAS_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a metas project",
        after_help = "EXAMPLES:\n    # Create .metas/ with config and database\n    metas init"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Setup", about = "Manage sectors")]
    Sector {
        #[command(subcommand)]
        command: cmd::sector::SectorCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage indicators",
        after_help = "EXAMPLES:\n    # Quarterly revenue target from January 2025\n    metas indicator add --name Revenue --sector Finance --target 1.500,00 \\\n        --kind monetary --start 2025-01 --periodicity 3\n\n    # Close the indicator in June\n    metas indicator update 1 --end 2025-06\n\n    # Delete it with its history\n    metas indicator remove 1"
    )]
    Indicator {
        #[command(subcommand)]
        command: cmd::indicator::IndicatorCommand,
    },

    #[command(
        next_help_heading = "Submissions",
        about = "Record a realized value",
        after_help = "EXAMPLES:\n    # Confirm March\n    metas submit 1 2025-03 1.234,56 --actor ana\n\n    # Open a pending row\n    metas submit 1 2025-04"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Submissions",
        about = "List competences still waiting for a value"
    )]
    Pending(cmd::pending::PendingArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Reconcile target rows with each schedule"
    )]
    Reconcile(cmd::reconcile::ReconcileArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Repair submissions against each schedule",
        long_about = "Null out, delete, deduplicate and fill submissions so every indicator \
                      matches its schedule. Reports only unless --apply is given.",
        after_help = "EXAMPLES:\n    # See what would change\n    metas sanitize --verbose\n\n    # Apply for one indicator and a window\n    metas sanitize --indicator-id 3 --since 2025-01 --until 2025-06 --apply"
    )]
    Sanitize(cmd::sanitize::SanitizeArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Remove targets and pending rows from the current month on"
    )]
    PruneFuture(cmd::prune::PruneArgs),

    #[command(next_help_heading = "Reports", about = "Attainment per competence")]
    Status(cmd::status::StatusArgs),

    #[command(next_help_heading = "Reports", about = "Show the action log")]
    Log(cmd::log::LogArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    metas completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("METAS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "metas=debug,info"
        } else {
            "metas=info,warn"
        })
    });

    let format = env::var("METAS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

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

fn run(cli: Cli, session: &cmd::Session) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, session),
        Commands::Sector { command } => cmd::sector::run_sector(&command, session),
        Commands::Indicator { command } => cmd::indicator::run_indicator(&command, session),
        Commands::Submit(args) => cmd::submit::run_submit(&args, session),
        Commands::Pending(args) => cmd::pending::run_pending(&args, session),
        Commands::Reconcile(args) => cmd::reconcile::run_reconcile(&args, session),
        Commands::Sanitize(args) => cmd::sanitize::run_sanitize(&args, session),
        Commands::PruneFuture(args) => cmd::prune::run_prune(&args, session),
        Commands::Status(args) => cmd::status::run_status(&args, session),
        Commands::Log(args) => cmd::log::run_log(&args, session),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn fail(mode: OutputMode, err: &anyhow::Error) -> ExitCode {
    if render_error(mode, &CliError::from(err)).is_err() {
        eprintln!("error: {err:#}");
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };
    let root = match env::current_dir() {
        Ok(root) => root,
        Err(err) => return fail(fallback, &err.into()),
    };
    let config = match config::resolve_config(&root, cli.json) {
        Ok(config) => config,
        Err(err) => return fail(fallback, &err),
    };

    let session = cmd::Session {
        db_path: cli.db.clone().unwrap_or_else(|| cmd::default_db_path(&root)),
        output: OutputMode::from_resolved(&config.resolved_output),
        root,
        config,
        clock: SystemClock::from_env(),
        verbose: cli.verbose,
    };
    debug!(db = %session.db_path.display(), output = ?session.output, "session resolved");

    match run(cli, &session) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(session.output, &err),
    }
}
