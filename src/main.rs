//! grive-utils - companion tool for the grive Google Drive client
//!
//! Checks the grive version, keeps sync preferences and runs grive
//! periodically while reporting what changed.

mod app;
mod cli;
mod config;
mod dialog;
mod error;
mod grive;
mod status;
mod version;

use anyhow::Result;
use clap::Parser;
use std::io;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::GriveUtils;
use crate::cli::{Cli, Commands};
use crate::dialog::FatalDialog;
use crate::error::GriveUtilsError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    // Execute command
    let result = run(cli).await;

    if let Err(e) = result {
        error!("Error: {}", e);
        if let Some(title) = e.fatal_title() {
            show_fatal(title, &e);
        } else {
            eprintln!("\nError: {}", e);
            eprintln!("\nUse 'grive-utils --help' for usage information.");
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> crate::error::Result<()> {
    let config_path = cli.config.as_deref();
    let load = || GriveUtils::new(config_path, cli.grive.clone());

    match cli.command {
        Commands::Check => load()?.check(),
        Commands::Prefs => load()?.preferences(),
        Commands::Show => load()?.show(),
        Commands::Sync { json } => load()?.sync(json).await,
        Commands::Watch { json } => load()?.watch(json).await,
        Commands::Pause => load()?.set_paused(true),
        Commands::Resume => load()?.set_paused(false),
        Commands::Open => load()?.open_folder(),
        Commands::Parse { json } => {
            GriveUtils::parse_lines(io::stdin().lock(), io::stdout().lock(), json)
        }
    }
}

fn show_fatal(title: &str, err: &GriveUtilsError) {
    let message = err.to_string();
    let dialog = FatalDialog::new(title, &message);
    let shown = if app::interactive() {
        dialog.show(io::stdin().lock(), io::stderr())
    } else {
        dialog.render(io::stderr())
    };
    if let Err(e) = shown {
        eprintln!("{}: {}", title, message);
        error!("Could not show fatal dialog: {}", e);
    }
}
