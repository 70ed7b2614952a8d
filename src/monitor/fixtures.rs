//! Builders shared by the engine tests.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::gitlab::api_types::{ApiJob, ApiProject};
use crate::gitlab::fake::FakeSource;

use super::cache::Project;
use super::reduce::TrackedJob;
use super::view::JobView;
use super::{Monitor, Settings};

pub const BASE_URL: &str = "https://gitlab.example.com/";

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn project_json(id: u64, path: &str, activity: DateTime<Utc>, jobs_enabled: bool) -> Value {
  let (namespace, name) = path.split_once('/').unwrap();
  json!({
    "id": id,
    "name_with_namespace": format!("{} / {}", namespace, name),
    "path_with_namespace": path,
    "namespace": { "name": namespace, "full_path": namespace },
    "last_activity_at": activity,
    "jobs_enabled": jobs_enabled,
  })
}

pub fn meta(id: u64, path: &str, activity: DateTime<Utc>, jobs_enabled: bool) -> ApiProject {
  serde_json::from_value(project_json(id, path, activity, jobs_enabled)).unwrap()
}

pub fn job_json(name: &str, status: &str, started_at: Option<DateTime<Utc>>) -> Value {
  json!({
    "ref": "main",
    "stage": "test",
    "name": name,
    "status": status,
    "started_at": started_at,
    "finished_at": null,
    "commit": { "author_name": "Kim", "title": "Change things" },
    "pipeline": { "id": 77 },
  })
}

/// A cached project holding exactly the given `(name, status, started_at)` jobs.
pub fn project_with_jobs(
  id: u64,
  path: &str,
  jobs: &[(&str, &str, Option<DateTime<Utc>>)],
) -> Project {
  let base = Url::parse(BASE_URL).unwrap();
  let mut project = Project::new(meta(id, path, at(0, 0), true));
  for (name, status, started_at) in jobs {
    let job: ApiJob = serde_json::from_value(job_json(name, status, *started_at)).unwrap();
    let view = JobView::new(&base, &project.meta, &job);
    project
      .jobs
      .insert(view.key.clone(), TrackedJob { job, view });
  }
  project
}

fn settings(slugs: &[&str], interval: Duration) -> Settings {
  Settings {
    base_url: Url::parse(BASE_URL).unwrap(),
    interval,
    slugs: slugs.iter().map(|s| s.to_string()).collect(),
    additional_query: String::new(),
  }
}

pub fn monitor(source: &FakeSource) -> Monitor<FakeSource> {
  Monitor::new(source.clone(), settings(&["*/*"], Duration::from_secs(15)))
}

pub fn monitor_with_slugs(source: &FakeSource, slugs: &[&str]) -> Monitor<FakeSource> {
  Monitor::new(source.clone(), settings(slugs, Duration::from_secs(15)))
}

pub fn monitor_with_interval(source: &FakeSource, interval: Duration) -> Monitor<FakeSource> {
  Monitor::new(source.clone(), settings(&["*/*"], interval))
}

/// Let spawned refreshes run to completion.
pub async fn settle() {
  for _ in 0..50 {
    tokio::task::yield_now().await;
  }
}
