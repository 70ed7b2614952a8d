use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::gitlab::paging::PageSource;
use crate::gitlab::GitLabClient;
use crate::monitor::{FleetRefresh, JobView, Monitor, Settings};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Consumer loop: polls the monitor and publishes snapshots as JSON lines on stdout.
pub struct App<S> {
  monitor: Monitor<S>,

  /// How often to ask the monitor for a snapshot
  poll_every: Duration,

  /// Last snapshot written, to suppress duplicates
  last_emitted: Option<Vec<JobView>>,

  /// Whether to quit
  should_quit: bool,
}

impl App<GitLabClient> {
  pub fn new(config: &Config) -> Result<Self> {
    let client = GitLabClient::new(&config.gitlab)?;
    let settings = Settings::from_config(&config.gitlab)?;

    Ok(Self::with_monitor(
      Monitor::new(client, settings),
      Duration::from_millis(config.poll.every_ms),
    ))
  }
}

impl<S: PageSource> App<S> {
  pub fn with_monitor(monitor: Monitor<S>, poll_every: Duration) -> Self {
    Self {
      monitor,
      poll_every,
      last_emitted: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    let mut events = EventHandler::new(self.poll_every);

    while !self.should_quit {
      match events.next().await {
        Some(event) => self.handle_event(event)?,
        None => break,
      }
    }

    info!("Shutting down");
    Ok(())
  }

  /// Walk the fleet once, then publish a single snapshot.
  pub async fn run_once(&mut self) -> Result<()> {
    match self.monitor.refresh_fleet().await {
      FleetRefresh::Completed { refreshed } => debug!(refreshed, "Initial fleet walk finished"),
      FleetRefresh::Busy => debug!("Fleet walk already running, using cached projects"),
    }
    let jobs = self.monitor.check();
    self.publish(jobs)
  }

  fn handle_event(&mut self, event: Event) -> Result<()> {
    match event {
      Event::Tick => {
        let jobs = self.monitor.check();
        self.publish(jobs)?;
      }
      Event::Shutdown => self.should_quit = true,
    }
    Ok(())
  }

  fn publish(&mut self, jobs: Vec<JobView>) -> Result<()> {
    if let Some(line) = self.snapshot_line(jobs)? {
      let mut stdout = std::io::stdout().lock();
      writeln!(stdout, "{}", line).map_err(|e| eyre!("Failed to write snapshot: {}", e))?;
      stdout
        .flush()
        .map_err(|e| eyre!("Failed to write snapshot: {}", e))?;
    }
    Ok(())
  }

  /// Serialize `jobs` unless they match the last published snapshot.
  fn snapshot_line(&mut self, jobs: Vec<JobView>) -> Result<Option<String>> {
    if self.last_emitted.as_ref() == Some(&jobs) {
      return Ok(None);
    }

    let line =
      serde_json::to_string(&jobs).map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;
    self.last_emitted = Some(jobs);
    Ok(Some(line))
  }
}
