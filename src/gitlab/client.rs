use crate::config::GitLabConfig;
use crate::gitlab::paging::{FetchError, Page, PageSource};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::path::Path;
use url::Url;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const TOTAL_PAGES_HEADER: &str = "x-total-pages";

/// Project list, most recently active first, with statistics.
pub fn projects_endpoint(page: u32, per_page: u32, additional_query: &str) -> String {
  format!(
    "api/v4/projects?order_by=last_activity_at&statistics=yes&page={}&per_page={}{}",
    page, per_page, additional_query
  )
}

pub fn project_jobs_endpoint(project_id: u64, page: u32, per_page: u32) -> String {
  format!(
    "api/v4/projects/{}/jobs?page={}&per_page={}",
    project_id, page, per_page
  )
}

/// GitLab v4 API client
#[derive(Clone)]
pub struct GitLabClient {
  http: reqwest::Client,
  base_url: Url,
}

impl GitLabClient {
  pub fn new(config: &GitLabConfig) -> Result<Self> {
    let token = config.api_token()?;
    Self::build(config.base_url()?, &token, config.ca_path.as_deref())
  }

  /// Build a client for `base_url`, which must end with a slash.
  pub fn build(base_url: Url, token: &str, ca_path: Option<&Path>) -> Result<Self> {
    let mut token =
      HeaderValue::from_str(token).map_err(|e| eyre!("GitLab token is not a valid header: {}", e))?;
    token.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(TOKEN_HEADER, token);

    let mut builder = reqwest::Client::builder()
      .default_headers(headers)
      .user_agent(concat!("labwatch/", env!("CARGO_PKG_VERSION")));

    if let Some(path) = ca_path {
      let pem = std::fs::read(path)
        .map_err(|e| eyre!("Failed to read CA bundle {}: {}", path.display(), e))?;
      let certs = reqwest::Certificate::from_pem_bundle(&pem)
        .map_err(|e| eyre!("Failed to parse CA bundle {}: {}", path.display(), e))?;
      for cert in certs {
        builder = builder.add_root_certificate(cert);
      }
    }

    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  async fn get_page<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Page<T>, FetchError> {
    let url = self
      .base_url
      .join(endpoint)
      .map_err(|e| FetchError::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?;

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(FetchError::Upstream {
        status: status.as_u16(),
        body: truncate(body, 200),
      });
    }

    let total_pages = response
      .headers()
      .get(TOTAL_PAGES_HEADER)
      .ok_or_else(|| FetchError::Malformed("missing X-Total-Pages header".to_string()))?
      .to_str()
      .ok()
      .and_then(|v| v.trim().parse::<u32>().ok())
      .ok_or_else(|| FetchError::Malformed("invalid X-Total-Pages header".to_string()))?;

    let bytes = response
      .bytes()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    let items =
      serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;

    Ok(Page { items, total_pages })
  }
}

impl PageSource for GitLabClient {
  async fn fetch_page<T>(&self, endpoint: &str) -> Result<Page<T>, FetchError>
  where
    T: DeserializeOwned + Send + 'static,
  {
    self.get_page(endpoint).await
  }
}

fn truncate(mut s: String, max: usize) -> String {
  if s.len() > max {
    let mut cut = max;
    while !s.is_char_boundary(cut) {
      cut -= 1;
    }
    s.truncate(cut);
  }
  s
}
