//! Serde-deserializable types matching GitLab v4 API responses.
//!
//! Only the fields the monitor reads are declared; everything else in the
//! payload is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Projects endpoint
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiNamespace {
  pub name: String,
  #[serde(default)]
  pub full_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProject {
  pub id: u64,
  #[serde(default)]
  pub name_with_namespace: String,
  pub path_with_namespace: String,
  pub namespace: ApiNamespace,
  pub last_activity_at: DateTime<Utc>,
  /// Missing on instances that moved to `builds_access_level`; treat as disabled.
  #[serde(default)]
  pub jobs_enabled: bool,
}

// ============================================================================
// Jobs endpoint
// ============================================================================

/// Job status as reported by GitLab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Created,
  WaitingForResource,
  Preparing,
  Pending,
  Running,
  Success,
  Failed,
  Canceled,
  Skipped,
  Manual,
  Scheduled,
  #[serde(other)]
  Unknown,
}

impl JobStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      JobStatus::Created => "created",
      JobStatus::WaitingForResource => "waiting_for_resource",
      JobStatus::Preparing => "preparing",
      JobStatus::Pending => "pending",
      JobStatus::Running => "running",
      JobStatus::Success => "success",
      JobStatus::Failed => "failed",
      JobStatus::Canceled => "canceled",
      JobStatus::Skipped => "skipped",
      JobStatus::Manual => "manual",
      JobStatus::Scheduled => "scheduled",
      JobStatus::Unknown => "unknown",
    }
  }

  /// Queued or executing right now.
  pub fn is_running(self) -> bool {
    matches!(self, JobStatus::Pending | JobStatus::Running)
  }

  /// The job will not change status again without a new run.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      JobStatus::Failed | JobStatus::Success | JobStatus::Canceled | JobStatus::Skipped
    )
  }
}

impl std::fmt::Display for JobStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCommit {
  pub author_name: Option<String>,
  pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPipelineRef {
  pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiJob {
  #[serde(rename = "ref")]
  pub git_ref: String,
  pub stage: String,
  pub name: String,
  pub status: JobStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub finished_at: Option<DateTime<Utc>>,
  pub commit: Option<ApiCommit>,
  pub pipeline: ApiPipelineRef,
}
