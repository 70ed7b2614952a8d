use futures::StreamExt;
use std::pin::pin;
use tracing::{debug, info};

use crate::gitlab::api_types::{ApiJob, ApiProject};
use crate::gitlab::client::project_jobs_endpoint;
use crate::gitlab::paging::{paginate, PageSource};

use super::cache::Project;
use super::reduce::{reduce_jobs, TrackedJob};
use super::view::JobView;
use super::Monitor;

pub const JOBS_PER_PAGE: u32 = 20;

/// Whether `project` is selected by any of the configured slugs.
///
/// A slug is an exact `namespace/project` path, a `namespace/*` wildcard
/// (matched against the namespace path or its display name), or `*/*`.
pub fn slug_matches(slugs: &[String], project: &ApiProject) -> bool {
  slugs.iter().any(|slug| {
    if slug == "*/*" || *slug == project.path_with_namespace {
      return true;
    }
    slug
      .strip_suffix("/*")
      .is_some_and(|ns| ns == project.namespace.full_path || ns == project.namespace.name)
  })
}

impl<S: PageSource> Monitor<S> {
  /// Re-read the jobs of one project and store the result in the cache.
  ///
  /// Projects not selected by the slugs are returned untouched. If not even
  /// the first page of jobs could be fetched, the cache keeps its last-known
  /// job set.
  pub async fn refresh_project(&self, mut project: Project) -> Project {
    if !slug_matches(&self.settings().slugs, &project.meta) {
      debug!(project = %project.meta.path_with_namespace, "Skipping project outside slugs");
      return project;
    }

    if !project.meta.jobs_enabled {
      project.jobs.clear();
      self.store_project(&project);
      return project;
    }

    let id = project.id();
    let mut pages = pin!(paginate::<_, ApiJob, _>(
      &self.shared.source,
      JOBS_PER_PAGE,
      move |page, per_page| project_jobs_endpoint(id, page, per_page),
    ));

    let mut fetched = Vec::new();
    let mut received = 0usize;
    while let Some(page) = pages.next().await {
      received += 1;
      fetched.extend(page);
    }
    if received == 0 {
      return project;
    }

    let base_url = &self.settings().base_url;
    let tracked = fetched
      .into_iter()
      .map(|job| TrackedJob {
        view: JobView::new(base_url, &project.meta, &job),
        job,
      })
      .collect();
    let reduced = reduce_jobs(tracked);

    if !reduced.is_empty() {
      info!(
        project = %project.meta.name_with_namespace,
        jobs = reduced.len(),
        "Updated {} with {} jobs",
        project.meta.name_with_namespace,
        reduced.len()
      );
    }

    project.jobs = reduced
      .into_iter()
      .map(|job| (job.view.key.clone(), job))
      .collect();
    self.store_project(&project);
    project
  }

  pub(crate) fn store_project(&self, project: &Project) {
    self
      .cache()
      .projects
      .insert(project.id(), project.clone());
  }
}
