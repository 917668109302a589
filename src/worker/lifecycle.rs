//! Install and activate.

use futures::future::join_all;
use tracing::{error, info, warn};

use super::Worker;
use crate::cache::{CacheStorage, Partition, RequestKey};
use crate::error::WorkerError;
use crate::net::{Fetch, Request};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install or activation failed; the worker will never control pages
  Redundant,
}

impl std::fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Activated => "activated",
      Self::Redundant => "redundant",
    };
    f.write_str(name)
  }
}

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  /// Move to `to` if the current state is `from`.
  fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), WorkerError> {
    let mut state = self.state_guard();
    if *state != from {
      return Err(WorkerError::InvalidTransition { from: *state, to });
    }
    info!(from = %from, to = %to, "Lifecycle transition");
    *state = to;
    Ok(())
  }

  fn set_state(&self, to: LifecycleState) {
    *self.state_guard() = to;
  }

  /// Pre-warm the static partition with the install manifest.
  ///
  /// Every asset is fetched before anything is written; if any of them
  /// fails the install fails and the partition is left untouched.
  pub async fn install(&self) -> Result<usize, WorkerError> {
    self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;

    match self.precache().await {
      Ok(count) => {
        self.set_state(LifecycleState::Installed);
        self.skip_waiting();
        info!(assets = count, "Installed");
        Ok(count)
      }
      Err(err) => {
        self.set_state(LifecycleState::Redundant);
        error!(error = %err, "Install failed");
        Err(err)
      }
    }
  }

  async fn precache(&self) -> Result<usize, WorkerError> {
    let partition = self.names.name(Partition::Static);
    let requests = self
      .config
      .static_assets
      .iter()
      .map(|asset| self.scope.join(asset).map(Request::get))
      .collect::<Result<Vec<_>, _>>()?;

    let network = self.cache.network();
    let responses = join_all(requests.iter().map(|request| network.fetch(request))).await;

    let mut entries = Vec::with_capacity(requests.len());
    let mut failed = Vec::new();
    for (request, result) in requests.iter().zip(responses) {
      match result {
        Ok(response) if response.is_ok() => entries.push((RequestKey::from(request), response)),
        Ok(response) => {
          warn!(url = %request.url, status = response.status, "Precache asset returned an error status");
          failed.push(request.url.path().to_string());
        }
        Err(err) => {
          warn!(url = %request.url, error = %err, "Precache asset fetch failed");
          failed.push(request.url.path().to_string());
        }
      }
    }

    if !failed.is_empty() {
      return Err(WorkerError::Install { failed });
    }

    self.cache.storage().put_all(&partition, &entries)?;
    Ok(entries.len())
  }

  /// Evict superseded partitions and take control of open pages.
  ///
  /// Returns the names of the deleted partitions.
  pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
    self.transition(LifecycleState::Installed, LifecycleState::Activating)?;

    let deleted = match self.evict_stale_partitions() {
      Ok(deleted) => deleted,
      Err(err) => {
        self.set_state(LifecycleState::Redundant);
        error!(error = %err, "Activation failed");
        return Err(err);
      }
    };

    let claimed = self.clients.claim();
    self.set_state(LifecycleState::Activated);
    info!(deleted = deleted.len(), claimed, "Activated");
    Ok(deleted)
  }

  fn evict_stale_partitions(&self) -> Result<Vec<String>, WorkerError> {
    let storage = self.cache.storage();
    let mut deleted = Vec::new();

    for name in storage.keys()? {
      if self.names.is_current(&name) {
        continue;
      }
      info!(partition = %name, "Deleting stale cache partition");
      storage.delete(&name)?;
      deleted.push(name);
    }

    Ok(deleted)
  }
}

#[cfg(test)]
mod tests {
  use super::super::tests::{worker, SCOPE};
  use super::*;
  use crate::net::Response;

  #[tokio::test]
  async fn install_precaches_manifest_and_activate_evicts_old_version() {
    let (worker, network) = worker(&["/", "/a.css"]);
    network.respond_text(SCOPE, 200, "<html>");
    network.respond_text(&format!("{SCOPE}a.css"), 200, "a{}");
    let storage = worker.cache.storage();
    storage
      .put("flow-static-v0", &RequestKey::get("http://localhost:8080/old.css"), &Response::new(200, ""))
      .unwrap();
    storage.open("flow-images-v1").unwrap();

    assert_eq!(worker.install().await.unwrap(), 2);
    assert_eq!(worker.state(), LifecycleState::Installed);
    assert!(worker.wants_skip_waiting());
    assert_eq!(storage.count("flow-static-v1").unwrap(), 2);

    let deleted = worker.activate().await.unwrap();

    assert_eq!(deleted, vec!["flow-static-v0".to_string()]);
    assert_eq!(worker.state(), LifecycleState::Activated);
    assert_eq!(
      storage.keys().unwrap(),
      vec!["flow-images-v1".to_string(), "flow-static-v1".to_string()]
    );
  }

  #[tokio::test]
  async fn install_fails_without_committing_anything() {
    let (worker, network) = worker(&["/", "/missing.js"]);
    network.respond_text(SCOPE, 200, "<html>");

    let err = worker.install().await.unwrap_err();

    assert!(matches!(err, WorkerError::Install { ref failed } if failed == &vec!["/missing.js".to_string()]));
    assert_eq!(worker.state(), LifecycleState::Redundant);
    assert!(worker.cache.storage().keys().unwrap().is_empty());
    assert!(worker.cache_status().unwrap().is_empty());
  }

  #[tokio::test]
  async fn install_fails_when_offline() {
    let (worker, network) = worker(&["/"]);
    network.set_offline(true);

    assert!(worker.install().await.is_err());
    assert_eq!(worker.state(), LifecycleState::Redundant);
    assert!(!worker.cache.storage().has("flow-static-v1").unwrap());
  }

  #[tokio::test]
  async fn activate_before_install_is_rejected() {
    let (worker, _) = worker(&[]);

    let err = worker.activate().await.unwrap_err();

    assert!(matches!(
      err,
      WorkerError::InvalidTransition {
        from: LifecycleState::Parsed,
        to: LifecycleState::Activating
      }
    ));
  }

  #[tokio::test]
  async fn activate_claims_open_clients() {
    let (worker, _) = worker(&[]);
    let _page = worker.clients().connect(format!("{SCOPE}dashboard"));

    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    assert!(worker.clients().list().iter().all(|c| c.controlled));
  }
}
