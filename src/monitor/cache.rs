//! In-memory mirror of the fleet, owned by a [`Monitor`](super::Monitor).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tokio::time::Instant;

use crate::gitlab::api_types::ApiProject;

use super::reduce::TrackedJob;
use super::view::JobView;

/// A project and the jobs currently shown for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
  pub meta: ApiProject,
  /// Keyed by [`JobView::key`], in upstream order
  pub jobs: IndexMap<String, TrackedJob>,
  /// Recomputed on every check
  pub has_running_jobs: bool,
}

impl Project {
  pub fn new(meta: ApiProject) -> Self {
    Self {
      meta,
      jobs: IndexMap::new(),
      has_running_jobs: false,
    }
  }

  pub fn id(&self) -> u64 {
    self.meta.id
  }

  /// Whether any job may still change status.
  pub fn any_unfinished(&self) -> bool {
    self.jobs.values().any(|j| !j.job.status.is_terminal())
  }

  pub fn views(&self) -> impl Iterator<Item = &JobView> {
    self.jobs.values().map(|j| &j.view)
  }
}

#[derive(Debug, Default)]
pub struct Cache {
  /// Result of the last completed check
  pub jobs: Vec<JobView>,
  pub projects: BTreeMap<u64, Project>,
  /// Activity time of the most recently active project at the last fleet refresh
  pub last_activity_at: Option<DateTime<Utc>>,
  pub last_fleet_check: Option<Instant>,
}
