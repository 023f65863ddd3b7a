//! # sitefab CLI
//!
//! Command-line interface for the sitefab static site fabricator.

mod commands;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use sitefab_core::{Config, Pipeline};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sitefab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Build every page under this folder (defaults to the configured folder)
    #[arg(long, num_args = 0..=1, value_name = "FOLDER")]
    folder: Option<Option<PathBuf>>,

    /// Where output is written
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Build a single file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Copy a folder into the destination without rendering (repeatable)
    #[arg(long, value_name = "FOLDER")]
    copy: Vec<PathBuf>,

    /// Load hook scripts from this folder (defaults to the configured folder)
    #[arg(long, num_args = 0..=1, value_name = "FOLDER")]
    scripts: Option<Option<PathBuf>>,

    /// Serve the destination, mounted at MOUNT
    #[arg(long, num_args = 0..=1, default_missing_value = "/", value_name = "MOUNT")]
    serve: Option<String>,

    /// Port for --serve
    #[arg(long)]
    port: Option<u16>,

    /// Path to configuration file (sitefab.yml is used when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop at the first file that fails to build
    #[arg(long)]
    fail_fast: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.folder.is_some()
            || self.file.is_some()
            || !self.copy.is_empty()
            || self.scripts.is_some()
            || self.serve.is_some()
    }

    /// Apply flags over file values. Flag paths are relative to the
    /// working directory, not the config file.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(Some(folder)) = &self.folder {
            config.folder = absolute(folder)?;
        }
        if let Some(destination) = &self.destination {
            config.destination = absolute(destination)?;
        }
        if let Some(Some(scripts)) = &self.scripts {
            config.scripts = Some(absolute(scripts)?);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.has_action() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = config.config_path() {
        tracing::debug!("Loaded config from {}", path.display());
    }
    cli.apply(&mut config)?;

    let source = absolute(&config.folder_dir())?;
    let destination = absolute(&config.destination_dir())?;
    let mut pipeline = Pipeline::from_config(&config);
    pipeline.set_source(&source);

    // Dispatch order: scripts, folder, file, copy, serve
    if cli.scripts.is_some() || config.scripts.is_some() {
        match config.scripts_dir() {
            Some(dir) => commands::load_scripts(&mut pipeline, &absolute(&dir)?),
            None => tracing::warn!("--scripts given but no scripts folder is configured"),
        }
    }

    if cli.folder.is_some() {
        commands::build_folder(&mut pipeline, &source, &destination)?;
    }

    if let Some(file) = &cli.file {
        commands::build_file(&mut pipeline, &absolute(file)?, &destination)?;
    }

    if !cli.copy.is_empty() {
        let folders = cli
            .copy
            .iter()
            .map(|f| absolute(f))
            .collect::<Result<Vec<_>>>()?;
        commands::copy_folders(&mut pipeline, &folders, &destination)?;
    }

    if let Some(mount) = &cli.serve {
        commands::serve(&destination, mount, config.port).await?;
    }

    Ok(())
}
