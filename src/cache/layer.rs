//! Cache layer that runs the caching strategies against the network.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, RequestKey};
use crate::error::StrategyError;
use crate::net::{Fetch, Request, Response};

/// How a request is resolved against a partition and the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  CacheFirst,
  NetworkFirst,
  StaleWhileRevalidate,
}

/// Cache layer that manages caching logic and network fetching.
///
/// Only 2xx responses are ever written; everything else is passed
/// through untouched. Background refreshes are tracked so the owner can
/// wait for them with [`CacheLayer::settle`] before shutting down.
pub struct CacheLayer<S: CacheStorage, N: Fetch> {
  storage: Arc<S>,
  network: Arc<N>,
  revalidations: Arc<Mutex<JoinSet<()>>>,
}

impl<S, N> CacheLayer<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  pub fn new(storage: Arc<S>, network: Arc<N>) -> Self {
    Self {
      storage,
      network,
      revalidations: Arc::new(Mutex::new(JoinSet::new())),
    }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  pub fn network(&self) -> &Arc<N> {
    &self.network
  }

  pub async fn run(
    &self,
    strategy: Strategy,
    request: &Request,
    partition: &str,
  ) -> Result<CacheResult, StrategyError> {
    match strategy {
      Strategy::CacheFirst => self.cache_first(request, partition).await,
      Strategy::NetworkFirst => self.network_first(request, partition).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, partition).await,
    }
  }

  /// Serve from the partition; only go to the network on a miss.
  ///
  /// A hit is never revalidated. A miss costs exactly one fetch, and a
  /// failed fetch is returned to the caller as is.
  pub async fn cache_first(
    &self,
    request: &Request,
    partition: &str,
  ) -> Result<CacheResult, StrategyError> {
    let key = RequestKey::from(request);

    if let Some(entry) = self.storage.match_request(partition, &key)? {
      debug!(url = %key.url(), partition, "Cache hit");
      return Ok(CacheResult::from_cache(entry));
    }

    debug!(url = %key.url(), partition, "Cache miss, fetching");
    let response = self.network.fetch(request).await?;
    self.store(partition, &key, &response)?;

    Ok(CacheResult::from_network(response))
  }

  /// Try the network; fall back to the partition only when the fetch
  /// itself fails. HTTP error statuses are returned, not replaced.
  pub async fn network_first(
    &self,
    request: &Request,
    partition: &str,
  ) -> Result<CacheResult, StrategyError> {
    let key = RequestKey::from(request);

    match self.network.fetch(request).await {
      Ok(response) => {
        self.store(partition, &key, &response)?;
        Ok(CacheResult::from_network(response))
      }
      Err(err) => match self.storage.match_request(partition, &key)? {
        Some(entry) => {
          debug!(url = %key.url(), partition, error = %err, "Network failed, serving cached copy");
          Ok(CacheResult::from_cache(entry))
        }
        None => Err(err.into()),
      },
    }
  }

  /// Answer from the partition right away and refresh it in the background.
  ///
  /// With a cached copy the refresh runs on a tracked task that is never
  /// awaited here; its failures are only logged. Without one the caller
  /// waits for the fetch and its result is stored as usual.
  pub async fn stale_while_revalidate(
    &self,
    request: &Request,
    partition: &str,
  ) -> Result<CacheResult, StrategyError> {
    let key = RequestKey::from(request);

    match self.storage.match_request(partition, &key)? {
      Some(entry) => {
        self.spawn_revalidation(request.clone(), partition.to_string(), key);
        Ok(CacheResult::from_cache(entry))
      }
      None => {
        let response = self.network.fetch(request).await?;
        self.store(partition, &key, &response)?;
        Ok(CacheResult::from_network(response))
      }
    }
  }

  /// Wait for every background refresh started so far, including any
  /// started while waiting.
  pub async fn settle(&self) {
    loop {
      let mut pending = std::mem::take(&mut *self.revalidations());
      if pending.is_empty() {
        return;
      }
      while let Some(result) = pending.join_next().await {
        if let Err(err) = result {
          warn!(error = %err, "Background revalidation task failed");
        }
      }
    }
  }

  fn revalidations(&self) -> MutexGuard<'_, JoinSet<()>> {
    self.revalidations.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn spawn_revalidation(&self, request: Request, partition: String, key: RequestKey) {
    let storage = Arc::clone(&self.storage);
    let network = Arc::clone(&self.network);

    let mut revalidations = self.revalidations();
    while revalidations.try_join_next().is_some() {}
    revalidations.spawn(async move {
      let response = match network.fetch(&request).await {
        Ok(response) => response,
        Err(err) => {
          warn!(url = %key.url(), error = %err, "Background revalidation failed");
          return;
        }
      };

      if !response.is_cacheable() {
        debug!(url = %key.url(), status = response.status, "Not caching revalidated response");
      } else if let Err(err) = storage.put(&partition, &key, &response) {
        warn!(url = %key.url(), partition = %partition, error = %err, "Failed to store revalidated response");
      }
    });
  }

  fn store(&self, partition: &str, key: &RequestKey, response: &Response) -> Result<(), StrategyError> {
    if response.is_cacheable() {
      self.storage.put(partition, key, response)?;
    } else {
      debug!(url = %key.url(), status = response.status, "Not caching response");
    }
    Ok(())
  }
}

impl<S: CacheStorage, N: Fetch> Clone for CacheLayer<S, N> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      revalidations: Arc::clone(&self.revalidations),
    }
  }
}
