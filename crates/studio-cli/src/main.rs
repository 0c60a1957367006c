//! Studio CLI - operator harness for the generation queues
//!
//! # Usage
//!
//! ```bash
//! # Show the resolved cool-down of every feature queue
//! studio info
//!
//! # Push five mock image generations through the image queue
//! studio run --feature image --jobs 5 --latency-ms 800
//!
//! # Same, with every third call failing and a 2s cool-down
//! studio run --feature video --jobs 6 --fail-every 3 --delay-ms 2000
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{info, run};

/// Generation Studio queue harness
#[derive(Parser)]
#[command(
    name = "studio",
    version,
    about = "Generation Studio - request queue harness",
    long_about = "Inspect and exercise the per-feature request queues.\n\n\
                  Each feature (image, video, storybook) admits one generation\n\
                  at a time and waits out a cool-down between calls."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show resolved queue configuration
    #[command(name = "info")]
    Info(info::InfoArgs),

    /// Drive a batch of mock generations through one queue
    #[command(name = "run")]
    Run(run::RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => info::run(args),
        Commands::Run(args) => run::run(args).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}
