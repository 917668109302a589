//! Scriptable network for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::FetchError;

use super::types::{Request, Response};
use super::Fetch;

/// Network double with canned responses and per-URL call counters.
///
/// Unknown URLs answer 404. While offline every fetch rejects.
#[derive(Default)]
pub struct MockNetwork {
  responses: Mutex<HashMap<String, Response>>,
  calls: Mutex<HashMap<String, usize>>,
  offline: AtomicBool,
  gate: Mutex<Option<Arc<Notify>>>,
}

impl MockNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn respond_text(&self, url: &str, status: u16, body: &str) {
    self.respond(url, Response::new(status, body));
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  /// Hold every subsequent fetch until the returned gate is notified.
  pub fn hold(&self) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
    gate
  }

  pub fn calls(&self, url: &str) -> usize {
    self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().values().sum()
  }
}

#[async_trait]
impl Fetch for MockNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    let url = request.cache_url();
    *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

    let gate = self.gate.lock().unwrap().clone();
    if let Some(gate) = gate {
      gate.notified().await;
    }

    if self.offline.load(Ordering::SeqCst) {
      return Err(FetchError::Offline { url });
    }

    Ok(
      self
        .responses
        .lock()
        .unwrap()
        .get(&url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "not found")),
    )
  }
}
