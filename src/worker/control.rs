//! Control messages from the page thread.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use super::{LifecycleState, Worker};
use crate::cache::{CacheStorage, RequestKey};
use crate::clients::ClientId;
use crate::error::WorkerError;
use crate::messages::{ControlMessage, StatusMessage};
use crate::net::{Fetch, Response};

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  /// Handle a `{ type, payload }` message from a page.
  ///
  /// Unknown or malformed messages are logged and ignored. A reply, if
  /// any, is posted back to `source` and also returned.
  pub async fn handle_message(
    &self,
    data: &Value,
    source: Option<ClientId>,
  ) -> Result<Option<StatusMessage>, WorkerError> {
    let message = match ControlMessage::parse(data) {
      Ok(message) => message,
      Err(err) => {
        warn!(error = %err, "Ignoring control message");
        return Ok(None);
      }
    };

    let reply = match message {
      ControlMessage::SkipWaiting => {
        self.skip_waiting();
        if self.state() == LifecycleState::Installed {
          self.activate().await?;
        }
        None
      }
      ControlMessage::CacheUpdate {
        cache_name,
        url,
        data,
      } => {
        let url = self.scope.join(&url)?;
        self.cache.storage().put(
          &cache_name,
          &RequestKey::get(url.as_str()),
          &Response::json(200, &data),
        )?;
        info!(partition = %cache_name, url = %url, "Cache updated from page");
        None
      }
      ControlMessage::ClearCache { cache_name } => {
        self.clear_cache(cache_name.as_deref())?;
        None
      }
      ControlMessage::GetCacheStatus => Some(StatusMessage::CacheStatus(self.cache_status()?)),
    };

    if let (Some(reply), Some(id)) = (&reply, source) {
      if !self.clients.post(id, reply.clone()) {
        warn!(client = id, "Could not deliver reply, client is gone");
      }
    }

    Ok(reply)
  }

  fn clear_cache(&self, cache_name: Option<&str>) -> Result<(), WorkerError> {
    let storage = self.cache.storage();
    let targets = match cache_name {
      Some(name) => vec![name.to_string()],
      None => storage.keys()?,
    };

    for name in targets {
      if storage.delete(&name)? {
        info!(partition = %name, "Cache partition cleared");
      }
    }
    Ok(())
  }

  /// Entry count for every existing partition.
  pub fn cache_status(&self) -> Result<BTreeMap<String, usize>, WorkerError> {
    let storage = self.cache.storage();
    let mut status = BTreeMap::new();
    for name in storage.keys()? {
      let count = storage.count(&name)?;
      status.insert(name, count);
    }
    Ok(status)
  }
}

#[cfg(test)]
mod tests {
  use super::super::tests::{worker, SCOPE};
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn clear_cache_then_status_omits_partition() {
    let (worker, _) = worker(&[]);
    let storage = worker.cache().storage();
    storage
      .put("flow-images-v1", &RequestKey::get("http://localhost:8080/a.png"), &Response::new(200, "a"))
      .unwrap();
    storage
      .put("flow-static-v1", &RequestKey::get(SCOPE), &Response::new(200, "<html>"))
      .unwrap();

    let cleared = worker
      .handle_message(
        &json!({"type": "CLEAR_CACHE", "payload": {"cacheName": "flow-images-v1"}}),
        None,
      )
      .await
      .unwrap();
    assert!(cleared.is_none());

    let status = worker
      .handle_message(&json!({"type": "GET_CACHE_STATUS"}), None)
      .await
      .unwrap();

    assert_eq!(
      status,
      Some(StatusMessage::CacheStatus(BTreeMap::from([(
        "flow-static-v1".to_string(),
        1
      )])))
    );
  }

  #[tokio::test]
  async fn clear_cache_without_name_clears_everything() {
    let (worker, _) = worker(&[]);
    let storage = worker.cache().storage();
    storage.open("flow-static-v1").unwrap();
    storage.open("flow-dynamic-v1").unwrap();

    worker
      .handle_message(&json!({"type": "CLEAR_CACHE"}), None)
      .await
      .unwrap();

    assert!(storage.keys().unwrap().is_empty());
  }

  #[tokio::test]
  async fn cache_update_stores_json_under_url() {
    let (worker, _) = worker(&[]);

    worker
      .handle_message(
        &json!({
          "type": "CACHE_UPDATE",
          "payload": {"cacheName": "flow-dynamic-v1", "url": "/api/users/me", "data": {"role": "counselor"}}
        }),
        None,
      )
      .await
      .unwrap();

    let entry = worker
      .cache()
      .storage()
      .match_request(
        "flow-dynamic-v1",
        &RequestKey::get("http://localhost:8080/api/users/me"),
      )
      .unwrap()
      .unwrap();
    assert_eq!(entry.response.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_slice(&entry.response.body).unwrap();
    assert_eq!(body, json!({"role": "counselor"}));
  }

  #[tokio::test]
  async fn status_reply_is_posted_to_source() {
    let (worker, _) = worker(&[]);
    let (id, mut rx) = worker.clients().connect(format!("{SCOPE}dashboard"));

    worker
      .handle_message(&json!({"type": "GET_CACHE_STATUS"}), Some(id))
      .await
      .unwrap();

    assert_eq!(
      rx.try_recv().unwrap(),
      StatusMessage::CacheStatus(BTreeMap::new())
    );
  }

  #[tokio::test]
  async fn skip_waiting_message_sets_flag() {
    let (worker, _) = worker(&[]);
    assert!(!worker.wants_skip_waiting());

    worker
      .handle_message(&json!({"type": "SKIP_WAITING"}), None)
      .await
      .unwrap();

    assert!(worker.wants_skip_waiting());
    assert_eq!(worker.state(), LifecycleState::Parsed);
  }

  #[tokio::test]
  async fn skip_waiting_activates_an_installed_worker() {
    let (worker, _) = worker(&[]);
    worker.install().await.unwrap();

    worker
      .handle_message(&json!({"type": "SKIP_WAITING"}), None)
      .await
      .unwrap();

    assert_eq!(worker.state(), LifecycleState::Activated);
  }

  #[tokio::test]
  async fn unknown_messages_are_ignored() {
    let (worker, _) = worker(&[]);

    let reply = worker
      .handle_message(&json!({"type": "LOGOUT", "payload": {}}), None)
      .await
      .unwrap();

    assert!(reply.is_none());
  }
}
