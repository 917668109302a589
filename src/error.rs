//! Typed errors for the seams that need to tell failures apart.
//!
//! Everything else uses `color_eyre::Result`.

use color_eyre::Report;
use thiserror::Error;

use crate::worker::LifecycleState;

/// A network-level failure: the fetch itself rejected.
///
/// Any HTTP status, including 4xx/5xx, is a transport success and never
/// shows up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("network unavailable while fetching {url}")]
  Offline { url: String },

  #[error("request to {url} timed out")]
  Timeout { url: String },

  #[error("request to {url} failed: {message}")]
  Transport { url: String, message: String },
}

impl FetchError {
  pub fn url(&self) -> &str {
    match self {
      Self::Offline { url } | Self::Timeout { url } | Self::Transport { url, .. } => url,
    }
  }
}

/// Failure of a caching strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
  /// The network failed and the strategy had nothing to fall back to.
  #[error(transparent)]
  Network(#[from] FetchError),

  #[error("cache storage failure: {0}")]
  Storage(Report),
}

impl From<Report> for StrategyError {
  fn from(report: Report) -> Self {
    Self::Storage(report)
  }
}

/// Failure of a worker event handler.
#[derive(Debug, Error)]
pub enum WorkerError {
  #[error("invalid lifecycle transition from {from} to {to}")]
  InvalidTransition {
    from: LifecycleState,
    to: LifecycleState,
  },

  #[error("install failed, could not precache: {}", failed.join(", "))]
  Install { failed: Vec<String> },

  #[error(transparent)]
  Strategy(#[from] StrategyError),

  #[error("cache storage failure: {0}")]
  Storage(Report),

  #[error(transparent)]
  Url(#[from] url::ParseError),
}

impl From<Report> for WorkerError {
  fn from(report: Report) -> Self {
    Self::Storage(report)
  }
}
