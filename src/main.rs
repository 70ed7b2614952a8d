mod app;
mod config;
mod event;
mod gitlab;
mod monitor;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "labwatch")]
#[command(about = "Mirror GitLab jobs for build status dashboards")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/labwatch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Walk the fleet once, print one snapshot and exit
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = init_tracing(config.gitlab.debug);

  let gitlab = &config.gitlab;
  debug!(
    url = %gitlab.url,
    interval = gitlab.interval,
    slugs = ?gitlab.slugs,
    additional_query = %gitlab.additional_query,
    ca_path = ?gitlab.ca_path,
    "Configuration loaded"
  );

  let mut app = app::App::new(&config)?;
  if args.once {
    app.run_once().await?;
  } else {
    app.run().await?;
  }

  Ok(())
}

/// Log to stderr so stdout carries only snapshots. `RUST_LOG` overrides the
/// level chosen by the `debug` config flag.
fn init_tracing(debug: bool) -> WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let default_filter = if debug { "warn,labwatch=debug" } else { "warn" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .init();

  guard
}
