use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;

use crate::error::FetchError;

use super::types::{Request, Response};
use super::Fetch;

/// Network client backed by reqwest
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("flow-offline/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetch for HttpClient {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone());
    if let Some(accept) = &request.accept {
      builder = builder.header(ACCEPT, accept);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| classify(request, e))?;

    let status = response.status();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|value| (name.as_str().to_string(), value.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| classify(request, e))?;

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
    })
  }
}

/// Map a reqwest failure onto the network error taxonomy.
fn classify(request: &Request, err: reqwest::Error) -> FetchError {
  let url = request.cache_url();
  if err.is_timeout() {
    FetchError::Timeout { url }
  } else if err.is_connect() {
    FetchError::Offline { url }
  } else {
    FetchError::Transport {
      url,
      message: err.to_string(),
    }
  }
}
