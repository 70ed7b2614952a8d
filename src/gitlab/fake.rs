//! In-memory page source for tests.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::paging::{FetchError, Page, PageSource};

enum Scripted {
  Page { items: Value, total_pages: u32 },
  Fail { status: u16 },
}

#[derive(Default)]
struct Inner {
  responses: Mutex<HashMap<String, Scripted>>,
  requests: Mutex<Vec<String>>,
  gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Scripted responses keyed by endpoint. Unscripted endpoints answer 404.
#[derive(Clone, Default)]
pub struct FakeSource {
  inner: Arc<Inner>,
}

impl FakeSource {
  pub fn new() -> Self {
    Self::default()
  }

  /// Answer `endpoint` with `items` and the given total page count.
  pub fn page(&self, endpoint: impl Into<String>, items: Value, total_pages: u32) {
    self.script(endpoint.into(), Scripted::Page { items, total_pages });
  }

  /// Answer `endpoint` with an HTTP error status.
  pub fn fail(&self, endpoint: impl Into<String>, status: u16) {
    self.script(endpoint.into(), Scripted::Fail { status });
  }

  /// Endpoints requested so far, in order.
  pub fn requests(&self) -> Vec<String> {
    lock(&self.inner.requests).clone()
  }

  /// Hold every subsequent fetch until the returned semaphore gets a permit.
  pub fn gate(&self) -> Arc<Semaphore> {
    let gate = Arc::new(Semaphore::new(0));
    *lock(&self.inner.gate) = Some(gate.clone());
    gate
  }

  fn script(&self, endpoint: String, response: Scripted) {
    lock(&self.inner.responses).insert(endpoint, response);
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex
    .lock()
    .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl PageSource for FakeSource {
  fn fetch_page<T>(&self, endpoint: &str) -> impl Future<Output = Result<Page<T>, FetchError>> + Send
  where
    T: DeserializeOwned + Send + 'static,
  {
    let inner = self.inner.clone();
    let endpoint = endpoint.to_string();

    async move {
      lock(&inner.requests).push(endpoint.clone());

      let gate = lock(&inner.gate).clone();
      if let Some(gate) = gate {
        if let Err(e) = gate.acquire().await {
          return Err(FetchError::Transport(e.to_string()));
        }
      }

      let scripted = match lock(&inner.responses).get(&endpoint) {
        Some(Scripted::Page { items, total_pages }) => Ok((items.clone(), *total_pages)),
        Some(Scripted::Fail { status }) => Err(*status),
        None => Err(404),
      };

      match scripted {
        Ok((items, total_pages)) => serde_json::from_value(items)
          .map(|items| Page { items, total_pages })
          .map_err(|e| FetchError::Malformed(e.to_string())),
        Err(status) => Err(FetchError::Upstream {
          status,
          body: format!("scripted failure for {}", endpoint),
        }),
      }
    }
  }
}
