//! Classification of intercepted requests.

use std::collections::BTreeSet;

use reqwest::Method;

use crate::cache::{Partition, Strategy};
use crate::config::Config;
use crate::net::{Destination, Request};

/// Why a request is left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
  NonGet,
  /// The identity/analytics provider does its own retrying and caching
  ExcludedHost,
}

/// Request class, in routing priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  Static,
  Image,
  Api,
  Navigation,
  Other,
}

impl RequestClass {
  pub fn strategy(self) -> Strategy {
    match self {
      Self::Static | Self::Image => Strategy::CacheFirst,
      Self::Navigation => Strategy::StaleWhileRevalidate,
      Self::Api | Self::Other => Strategy::NetworkFirst,
    }
  }

  pub fn partition(self) -> Partition {
    match self {
      Self::Static => Partition::Static,
      Self::Image => Partition::Images,
      Self::Api | Self::Navigation | Self::Other => Partition::Dynamic,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  Passthrough(PassReason),
  Intercept(RequestClass),
}

/// Decides which strategy and partition handle a request.
#[derive(Debug, Clone)]
pub struct Router {
  static_paths: BTreeSet<String>,
  excluded_hosts: BTreeSet<String>,
  api_hosts: BTreeSet<String>,
  image_extensions: BTreeSet<String>,
}

impl Router {
  pub fn new(config: &Config) -> Self {
    Self {
      static_paths: config.static_assets.iter().cloned().collect(),
      excluded_hosts: config.excluded_hosts.clone(),
      api_hosts: config.api_hosts.clone(),
      image_extensions: config.image_extensions.clone(),
    }
  }

  pub fn route(&self, request: &Request) -> Route {
    if request.method != Method::GET {
      return Route::Passthrough(PassReason::NonGet);
    }

    let host = request.url.host_str().unwrap_or_default().to_ascii_lowercase();
    if host_matches(&self.excluded_hosts, &host) {
      return Route::Passthrough(PassReason::ExcludedHost);
    }

    let path = request.url.path();
    let class = if self.is_static(path) {
      RequestClass::Static
    } else if request.destination == Destination::Image || self.has_image_extension(path) {
      RequestClass::Image
    } else if path.starts_with("/api/") || host_matches(&self.api_hosts, &host) {
      RequestClass::Api
    } else if request.accepts_html() {
      RequestClass::Navigation
    } else {
      RequestClass::Other
    };

    Route::Intercept(class)
  }

  fn is_static(&self, path: &str) -> bool {
    self.static_paths.contains(path) || path.ends_with(".css") || path.ends_with(".js")
  }

  fn has_image_extension(&self, path: &str) -> bool {
    path
      .rsplit_once('.')
      .filter(|(_, ext)| !ext.contains('/'))
      .is_some_and(|(_, ext)| self.image_extensions.contains(&ext.to_ascii_lowercase()))
  }
}

/// Exact host or any subdomain of it.
fn host_matches(hosts: &BTreeSet<String>, host: &str) -> bool {
  hosts
    .iter()
    .any(|pattern| host == pattern || host.ends_with(&format!(".{}", pattern)))
}
