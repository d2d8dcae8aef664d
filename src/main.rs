mod app;
mod auth;
mod cache;
mod cli;
mod clock;
mod config;
mod error;
mod logging;
mod store;
mod views;
mod workout;

use clap::Parser;
use color_eyre::Result;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logs go to a file; stdout is for command output
  let _guard = logging::init(&config::Config::data_dir()?.join("logs"))?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  app.run(args.command).await?;

  Ok(())
}
