use chrono::Duration;
use futures::future::join_all;
use futures::StreamExt;
use std::pin::pin;
use tracing::{debug, info};

use crate::gitlab::api_types::ApiProject;
use crate::gitlab::client::projects_endpoint;
use crate::gitlab::paging::{paginate, PageSource};

use super::cache::Project;
use super::Monitor;

pub const PROJECTS_PER_PAGE: u32 = 10;

/// Outcome of [`Monitor::refresh_fleet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetRefresh {
  /// Another fleet refresh was already running; nothing was done
  Busy,
  Completed { refreshed: usize },
}

impl<S: PageSource> Monitor<S> {
  /// Walk the project roster, most recently active first, refreshing every
  /// project with activity since the last walk.
  ///
  /// The walk stops pulling pages once it meets a project that is older than
  /// the watermark (less a one hour grace) or that already has unfinished
  /// jobs being tracked. Only one walk runs at a time.
  pub async fn refresh_fleet(&self) -> FleetRefresh {
    let Ok(_walk) = self.shared.fleet.try_lock() else {
      debug!("Fleet refresh already in flight");
      return FleetRefresh::Busy;
    };

    let previous = self.last_activity_at();
    let threshold = previous.map(|at| at - Duration::hours(1));

    let additional_query = self.settings().additional_query.clone();
    let mut pages = pin!(paginate::<_, ApiProject, _>(
      &self.shared.source,
      PROJECTS_PER_PAGE,
      move |page, per_page| projects_endpoint(page, per_page, &additional_query),
    ));

    let mut newest = None;
    let mut refreshed = 0usize;
    while let Some(projects) = pages.next().await {
      let mut caught_up = false;
      let mut pending = Vec::new();

      for meta in projects.into_iter().filter(|p| p.jobs_enabled) {
        let activity = meta.last_activity_at;
        newest.get_or_insert(activity);

        let recent = threshold.map_or(true, |t| activity > t);
        let busy = self
          .cache()
          .projects
          .get(&meta.id)
          .is_some_and(|p| p.has_running_jobs);

        if recent && !busy {
          refreshed += 1;
          pending.push(self.refresh_project(Project::new(meta)));
        } else {
          caught_up = true;
        }
      }

      join_all(pending).await;
      if caught_up {
        break;
      }
    }

    self.cache().last_activity_at = newest.or(previous);
    info!(refreshed, "Found {} new or updated projects", refreshed);

    FleetRefresh::Completed { refreshed }
  }
}

#[cfg(test)]
mod tests {
  use super::super::fixtures::*;
  use super::*;
  use crate::gitlab::client::project_jobs_endpoint;
  use crate::gitlab::fake::FakeSource;
  use serde_json::json;

  fn roster(page: u32) -> String {
    projects_endpoint(page, PROJECTS_PER_PAGE, "")
  }

  fn seed_watermark(monitor: &Monitor<FakeSource>, at: chrono::DateTime<chrono::Utc>) {
    monitor.cache().last_activity_at = Some(at);
  }

  #[tokio::test]
  async fn test_first_walk_refreshes_everything() {
    let source = FakeSource::new();
    source.page(
      roster(1),
      json!([
        project_json(1, "a/one", at(12, 0), true),
        project_json(2, "a/two", at(11, 0), false),
        project_json(3, "a/three", at(10, 0), true),
      ]),
      2,
    );
    source.page(roster(2), json!([project_json(4, "a/four", at(1, 0), true)]), 2);
    for id in [1, 3, 4] {
      source.page(
        project_jobs_endpoint(id, 1, 20),
        json!([job_json("build", "success", Some(at(9, 0)))]),
        1,
      );
    }
    let monitor = monitor(&source);

    let outcome = monitor.refresh_fleet().await;

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 3 });
    assert_eq!(monitor.last_activity_at(), Some(at(12, 0)));
    assert!(monitor.project(2).is_none());
    for id in [1, 3, 4] {
      assert_eq!(monitor.project(id).unwrap().jobs.len(), 1);
    }
  }

  #[tokio::test]
  async fn test_stale_first_project_stops_walk() {
    let source = FakeSource::new();
    source.page(
      roster(1),
      json!([project_json(1, "a/one", at(8, 0), true)]),
      3,
    );
    source.page(
      roster(2),
      json!([project_json(2, "a/two", at(7, 0), true)]),
      3,
    );
    let monitor = monitor(&source);
    seed_watermark(&monitor, at(10, 0));

    let outcome = monitor.refresh_fleet().await;

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 0 });
    assert_eq!(source.requests(), vec![roster(1)]);
    assert!(monitor.project(1).is_none());
    assert_eq!(monitor.last_activity_at(), Some(at(8, 0)));
  }

  #[tokio::test]
  async fn test_grace_window_admits_projects_just_before_watermark() {
    let source = FakeSource::new();
    source.page(
      roster(1),
      json!([
        project_json(1, "a/one", at(9, 30), true),
        project_json(2, "a/two", at(8, 59), true),
      ]),
      2,
    );
    source.page(
      project_jobs_endpoint(1, 1, 20),
      json!([job_json("build", "success", Some(at(9, 0)))]),
      1,
    );
    let monitor = monitor(&source);
    seed_watermark(&monitor, at(10, 0));

    let outcome = monitor.refresh_fleet().await;

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 1 });
    assert!(monitor.project(1).is_some());
    assert!(monitor.project(2).is_none());
    assert!(!source.requests().contains(&roster(2)));
  }

  #[tokio::test]
  async fn test_project_with_running_jobs_is_passed_through() {
    let source = FakeSource::new();
    source.page(
      roster(1),
      json!([project_json(5, "a/busy", at(12, 0), true)]),
      2,
    );
    let monitor = monitor(&source);
    let mut busy = project_with_jobs(5, "a/busy", &[("build", "running", Some(at(11, 0)))]);
    busy.has_running_jobs = true;
    monitor.store_project(&busy);

    let outcome = monitor.refresh_fleet().await;

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 0 });
    assert_eq!(source.requests(), vec![roster(1)]);
    assert_eq!(monitor.project(5), Some(busy));
  }

  #[tokio::test]
  async fn test_failed_roster_keeps_watermark() {
    let source = FakeSource::new();
    source.fail(roster(1), 429);
    let monitor = monitor(&source);
    seed_watermark(&monitor, at(10, 0));

    let outcome = monitor.refresh_fleet().await;

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 0 });
    assert_eq!(monitor.last_activity_at(), Some(at(10, 0)));
  }

  #[tokio::test]
  async fn test_additional_query_appended() {
    let source = FakeSource::new();
    let mut settings = monitor(&source).settings().clone();
    settings.additional_query = "&membership=true".to_string();
    let monitor = Monitor::new(source.clone(), settings);

    monitor.refresh_fleet().await;

    assert_eq!(
      source.requests(),
      vec![projects_endpoint(1, PROJECTS_PER_PAGE, "&membership=true")]
    );
  }

  #[tokio::test]
  async fn test_concurrent_refresh_is_noop() {
    let source = FakeSource::new();
    source.page(roster(1), json!([project_json(1, "a/one", at(12, 0), true)]), 1);
    source.page(project_jobs_endpoint(1, 1, 20), json!([]), 1);
    let monitor = monitor(&source);
    seed_watermark(&monitor, at(6, 0));
    let gate = source.gate();

    let in_flight = tokio::spawn({
      let monitor = monitor.clone();
      async move { monitor.refresh_fleet().await }
    });
    settle().await;

    assert_eq!(monitor.refresh_fleet().await, FleetRefresh::Busy);
    assert_eq!(monitor.last_activity_at(), Some(at(6, 0)));
    assert_eq!(source.requests(), vec![roster(1)]);

    gate.add_permits(10);
    let outcome = in_flight.await.unwrap();

    assert_eq!(outcome, FleetRefresh::Completed { refreshed: 1 });
    assert_eq!(monitor.last_activity_at(), Some(at(12, 0)));
  }
}
