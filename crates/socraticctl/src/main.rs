//! Socratic Control - terminal front-end for the Socratic paste guard.
//!
//! Talks to the mentor backend for one-shot questions, and runs the
//! interactive practice session.

use clap::Parser;
use owo_colors::OwoColorize;
use socraticctl::cli::Cli;
use socraticctl::{commands, errors};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so streamed mentor text stays clean on stdout
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::run(cli).await {
        eprintln!("{} {:#}", "error:".bright_red().bold(), e);
        std::process::exit(errors::exit_code_for(&e));
    }
}
