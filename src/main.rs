mod app;
mod cache;
mod commands;
mod config;
mod github;
mod logging;
mod protocol;
mod serve;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "prlens")]
#[command(about = "Cached reviewer lookups for GitHub pull request lists")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/prlens/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let cache = app::build_cache(&config)?;
  commands::execute(&cache, args.command.unwrap_or(Command::Serve)).await
}
