mod cli;
mod client;
mod clock;
mod config;
mod display;
mod error;
mod manager;
mod session;
mod storage;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "claude-sessions",
    version,
    about = "Start and track the Claude CLI usage session window"
)]
pub struct Args {
    #[arg(long, global = true, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Verbose output (debug logging)")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start a new session now
    StartNow {
        #[arg(short, long, help = "Start a new session even if one is active")]
        force: bool,
    },
    /// Show the current session
    Status,
    /// Extend the active session by the configured duration
    Refresh,
    /// Forget the stored session
    Stop,
}

fn print_help() {
    let _ = Args::command().print_help();
    println!();
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("claude_sessions=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::InvalidSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                print_help();
                return ExitCode::SUCCESS;
            }
            _ => e.exit(),
        },
    };

    init_tracing(args.verbose);

    let Some(command) = args.command else {
        print_help();
        return ExitCode::SUCCESS;
    };

    match cli::run(&args, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, message) = match err.downcast_ref::<error::SessionError>() {
                Some(e) => (e.exit_code(), e.to_string()),
                None => (1, format!("unexpected error: {:#}", err)),
            };
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{}", display::failure(&message));
            ExitCode::from(code)
        }
    }
}
