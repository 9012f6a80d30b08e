//! Inkwell CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ink-cli migrate
//!
//! # Delete carts past their expiry (run on a schedule, e.g. daily cron)
//! ink-cli carts purge-expired
//!
//! # Load catalog entries from a YAML file
//! ink-cli seed books seeds/books.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `carts purge-expired` - Delete expired carts
//! - `seed books` - Insert or update catalog entries

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ink-cli")]
#[command(author, version, about = "Inkwell CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Cart maintenance
    Carts {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Delete every cart whose expiry has passed
    PurgeExpired,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or update books from a YAML file
    Books {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Carts { action } => match action {
            CartAction::PurgeExpired => commands::carts::purge_expired().await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Books { file } => commands::seed::books(&file).await?,
        },
    }
    Ok(())
}
