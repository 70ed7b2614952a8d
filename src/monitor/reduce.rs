//! Narrowing a project's job history down to what a dashboard should show.

use chrono::{DateTime, Utc};
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::gitlab::api_types::{ApiJob, JobStatus};

use super::view::JobView;

/// A fetched job together with its derived view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedJob {
  pub job: ApiJob,
  pub view: JobView,
}

/// Reduce jobs (in upstream order) to the interesting subset.
///
/// First keeps one job per view key, the latest-started one, at its own
/// position in the input. Then keeps every job that starts after all jobs kept
/// before it, plus running or failed jobs regardless.
pub fn reduce_jobs(jobs: Vec<TrackedJob>) -> Vec<TrackedJob> {
  // key -> input index of the latest-started occurrence
  let mut winners: IndexMap<String, usize> = IndexMap::with_capacity(jobs.len());
  for (idx, job) in jobs.iter().enumerate() {
    match winners.entry(job.view.key.clone()) {
      Entry::Occupied(mut slot) => {
        if jobs[*slot.get()].view.start_order() < job.view.start_order() {
          slot.insert(idx);
        }
      }
      Entry::Vacant(slot) => {
        slot.insert(idx);
      }
    }
  }

  let mut latest: Option<DateTime<Utc>> = None;
  jobs
    .into_iter()
    .enumerate()
    .filter(|(idx, job)| winners.get(&job.view.key) == Some(idx))
    .map(|(_, job)| job)
    .filter(|job| {
      let started = job.view.start_order();
      if latest.map_or(true, |l| started > l) {
        latest = Some(started);
        true
      } else {
        job.view.is_running || job.job.status == JobStatus::Failed
      }
    })
    .collect()
}
