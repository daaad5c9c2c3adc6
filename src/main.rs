//! Stars - a static site generator for markdown blogs.

mod build;
mod cli;
mod config;
mod draft;
mod error;
mod generator;
mod ingest;
mod logger;
mod post;
mod serve;
mod store;
mod utils;
mod view;
mod watch;

use anyhow::{Result, bail};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands, DraftAction};
use config::SiteConfig;
use draft::{list_drafts, publish_draft};
use serve::serve_site;
use std::{path::Path, sync::Arc};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => build_site(&config).map(|_| ()),
        Commands::Serve { .. } => serve_site(Arc::new(config)),
        Commands::Draft { action } => match action {
            DraftAction::List => list_drafts(&config),
            DraftAction::Publish { slug } => publish_draft(&config, slug).map(|_| ()),
        },
    }
}

/// Load and validate configuration from CLI arguments.
///
/// A missing config file is fine; every setting has a default.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else if cli.config != Path::new("stars.toml") {
        bail!("Config file not found: {}", config_path.display());
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
