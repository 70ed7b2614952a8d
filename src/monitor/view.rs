//! Display-ready projection of a GitLab job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::gitlab::api_types::{ApiJob, ApiProject, JobStatus};

/// Color a dashboard paints a job with.
///
/// Serialized as the color strings build monitor dashboards expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusColor {
  #[serde(rename = "#ffa500")]
  Amber,
  #[serde(rename = "Blue")]
  Blue,
  #[serde(rename = "Red")]
  Red,
  #[serde(rename = "Green")]
  Green,
  #[serde(rename = "Gray")]
  Gray,
}

impl From<JobStatus> for StatusColor {
  fn from(status: JobStatus) -> Self {
    match status {
      JobStatus::Pending => StatusColor::Amber,
      JobStatus::Running => StatusColor::Blue,
      JobStatus::Failed => StatusColor::Red,
      JobStatus::Success => StatusColor::Green,
      _ => StatusColor::Gray,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
  /// `projectId-ref-stage-name`, stable across polls for the same job slot
  #[serde(rename = "id")]
  pub key: String,
  /// Project name with namespace
  pub number: String,
  /// `ref / name`
  pub project: String,
  pub is_running: bool,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
  pub requested_for: Option<String>,
  pub status: StatusColor,
  pub status_text: String,
  pub reason: Option<String>,
  pub has_errors: bool,
  pub has_warnings: bool,
  pub url: String,
}

impl JobView {
  /// Derive the view of `job` belonging to `project`.
  ///
  /// `base_url` is the instance URL with a trailing slash.
  pub fn new(base_url: &Url, project: &ApiProject, job: &ApiJob) -> Self {
    let commit = job.commit.as_ref();
    JobView {
      key: format!(
        "{}-{}-{}-{}",
        project.id, job.git_ref, job.stage, job.name
      ),
      number: project.name_with_namespace.clone(),
      project: format!("{} / {}", job.git_ref, job.name),
      is_running: job.status.is_running(),
      started_at: job.started_at,
      finished_at: job.finished_at,
      requested_for: commit.and_then(|c| c.author_name.clone()),
      status: job.status.into(),
      status_text: format!("{} {}", job.stage, job.status),
      reason: commit.and_then(|c| c.title.clone()),
      has_errors: false,
      has_warnings: false,
      url: format!(
        "{}{}/pipelines/{}",
        base_url, project.path_with_namespace, job.pipeline.id
      ),
    }
  }

  /// Start time for ordering; jobs that never started sort first.
  pub fn start_order(&self) -> DateTime<Utc> {
    self.started_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}
