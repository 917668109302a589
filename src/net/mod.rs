//! Network access for the cache layer.

mod client;
#[cfg(test)]
pub mod mock;
mod types;

use async_trait::async_trait;

use crate::error::FetchError;

pub use client::HttpClient;
pub use types::{Destination, Request, Response};

/// Anything that can perform a network fetch.
///
/// An HTTP error status is a successful fetch; only transport failures
/// are errors.
#[async_trait]
pub trait Fetch: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
