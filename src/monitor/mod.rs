//! The refresh engine: keeps an in-memory mirror of GitLab projects and their
//! jobs, and answers dashboard checks from it without waiting on the network.
//!
//! - [`Monitor::check`] flattens the mirror and schedules refreshes
//! - [`Monitor::refresh_fleet`] walks the project roster, newest activity first
//! - [`Monitor::refresh_project`] re-reads one project's jobs

mod cache;
mod fleet;
mod project;
mod reduce;
mod view;

#[cfg(test)]
mod fixtures;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::GitLabConfig;
use crate::gitlab::paging::PageSource;

use cache::Cache;
pub use cache::Project;
pub use fleet::FleetRefresh;
pub use view::{JobView, StatusColor};

/// Engine settings derived from the `gitlab` config section.
#[derive(Debug, Clone)]
pub struct Settings {
  /// Instance URL with a trailing slash
  pub base_url: Url,
  /// Minimum spacing between fleet refreshes
  pub interval: Duration,
  pub slugs: Vec<String>,
  pub additional_query: String,
}

impl Settings {
  pub fn from_config(config: &GitLabConfig) -> Result<Self> {
    Ok(Self {
      base_url: config.base_url()?,
      interval: config.interval(),
      slugs: config.slugs.clone(),
      additional_query: config.additional_query.clone(),
    })
  }
}

struct Shared<S> {
  source: S,
  settings: Settings,
  cache: Mutex<Cache>,
  /// Set while a check is flattening the cache
  checking: AtomicBool,
  /// Held for the duration of a fleet refresh
  fleet: tokio::sync::Mutex<()>,
}

/// Handle to the engine. Cheap to clone; clones share the same cache.
pub struct Monitor<S> {
  shared: Arc<Shared<S>>,
}

impl<S> Clone for Monitor<S> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<S: PageSource> Monitor<S> {
  pub fn new(source: S, settings: Settings) -> Self {
    Self {
      shared: Arc::new(Shared {
        source,
        settings,
        cache: Mutex::new(Cache::default()),
        checking: AtomicBool::new(false),
        fleet: tokio::sync::Mutex::new(()),
      }),
    }
  }

  pub fn settings(&self) -> &Settings {
    &self.shared.settings
  }

  /// Lock the cache. Never hold the guard across an await.
  fn cache(&self) -> MutexGuard<'_, Cache> {
    self
      .shared
      .cache
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of one cached project.
  pub fn project(&self, id: u64) -> Option<Project> {
    self.cache().projects.get(&id).cloned()
  }

  /// Activity watermark left by the last completed fleet refresh.
  pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
    self.cache().last_activity_at
  }

  /// Flatten the cached jobs of every project, in project id order.
  ///
  /// Projects that still have unfinished jobs get a background refresh, and
  /// a fleet refresh is started when the configured interval has passed. A
  /// check racing another one gets the previous result. Must be called from
  /// within a Tokio runtime.
  pub fn check(&self) -> Vec<JobView> {
    if self
      .shared
      .checking
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return self.cache().jobs.clone();
    }

    let (jobs, unfinished, fleet_due) = {
      let mut cache = self.cache();
      let mut jobs = Vec::new();
      let mut unfinished = Vec::new();

      for project in cache.projects.values_mut() {
        project.has_running_jobs = project.any_unfinished();
        jobs.extend(project.views().cloned());
        if project.has_running_jobs {
          unfinished.push(project.clone());
        }
      }
      cache.jobs = jobs.clone();

      let now = Instant::now();
      let fleet_due = cache
        .last_fleet_check
        .map_or(true, |at| now.duration_since(at) >= self.shared.settings.interval);
      if fleet_due {
        cache.last_fleet_check = Some(now);
      }

      (jobs, unfinished, fleet_due)
    };

    for project in unfinished {
      debug!(project = %project.meta.path_with_namespace, "Scheduling refresh for unfinished jobs");
      let monitor = self.clone();
      tokio::spawn(async move {
        monitor.refresh_project(project).await;
      });
    }

    self.shared.checking.store(false, Ordering::Release);

    if fleet_due {
      let monitor = self.clone();
      tokio::spawn(async move {
        monitor.refresh_fleet().await;
      });
    }

    jobs
  }
}
