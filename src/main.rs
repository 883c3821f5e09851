//! Ember - an incremental rebuild engine for static sites.

mod build;
mod classify;
mod cli;
mod config;
mod deps;
mod logger;
mod model;
mod pager;
mod payload;
mod rebuild;
mod render;
mod watch;

use anyhow::{Result, bail};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use model::Site;
use std::path::Path;
use watch::watch_site_blocking;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    let mut site = Site::new();

    match &cli.command {
        Commands::Build => {
            let written = build_site(&mut site, &config)?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Watch => watch_site_blocking(&mut site, &mut config),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else {
        bail!("config file not found: {}", config_path.display());
    };
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
