//! Fetch interception and the final offline fallback.

use serde_json::json;
use tracing::{debug, warn};

use super::Worker;
use crate::cache::{CacheResult, CacheStorage, Partition, RequestKey};
use crate::error::{FetchError, StrategyError, WorkerError};
use crate::net::{Fetch, Request, Response};
use crate::router::{PassReason, RequestClass, Route};

#[derive(Debug)]
pub enum FetchOutcome {
  /// Not intercepted; the browser performs the request itself
  Passthrough(PassReason),
  Responded(CacheResult),
}

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, WorkerError> {
    let class = match self.router.route(request) {
      Route::Passthrough(reason) => {
        debug!(url = %request.url, ?reason, "Passing request through");
        return Ok(FetchOutcome::Passthrough(reason));
      }
      Route::Intercept(class) => class,
    };

    let strategy = class.strategy();
    let partition = self.names.name(class.partition());
    debug!(url = %request.url, ?class, ?strategy, partition = %partition, "Intercepting request");

    match self.cache.run(strategy, request, &partition).await {
      Ok(result) => Ok(FetchOutcome::Responded(result)),
      Err(StrategyError::Network(err)) => {
        warn!(url = %request.url, error = %err, "Network failed with no cached copy");
        Ok(FetchOutcome::Responded(self.fallback(request, class, &err)?))
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Offline page for navigations, placeholder for images, otherwise (or
  /// when those were never cached) a JSON 503.
  fn fallback(
    &self,
    request: &Request,
    class: RequestClass,
    err: &FetchError,
  ) -> Result<CacheResult, WorkerError> {
    let substitute = if request.is_navigation() {
      Some(&self.offline_page)
    } else if class == RequestClass::Image {
      Some(&self.placeholder_image)
    } else {
      None
    };

    if let Some(url) = substitute {
      let partition = self.names.name(Partition::Static);
      let key = RequestKey::get(url.as_str());
      if let Some(entry) = self.cache.storage().match_request(&partition, &key)? {
        return Ok(CacheResult::fallback(entry.response));
      }
    }

    Ok(CacheResult::fallback(offline_response(err)))
  }
}

fn offline_response(err: &FetchError) -> Response {
  Response::json(
    503,
    &json!({
      "error": "offline",
      "message": "Network unavailable and no cached response exists",
      "url": err.url(),
    }),
  )
}
