//! Request and response types flowing through the cache layer.

use std::str::FromStr;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource the page asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
  Document,
  Image,
  Script,
  Style,
  /// fetch() calls from script and anything else
  #[default]
  Empty,
}

impl FromStr for Destination {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "document" => Ok(Self::Document),
      "image" => Ok(Self::Image),
      "script" => Ok(Self::Script),
      "style" => Ok(Self::Style),
      "" | "empty" => Ok(Self::Empty),
      other => Err(format!("unknown request destination: {}", other)),
    }
  }
}

/// An intercepted request. Lives only as long as its fetch event.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: Url,
  pub method: Method,
  pub destination: Destination,
  /// Value of the Accept header, if any
  pub accept: Option<String>,
}

impl Request {
  /// A plain GET, as issued by `fetch(url)`.
  pub fn get(url: Url) -> Self {
    Self {
      url,
      method: Method::GET,
      destination: Destination::Empty,
      accept: None,
    }
  }

  /// A page navigation.
  pub fn navigate(url: Url) -> Self {
    Self {
      url,
      method: Method::GET,
      destination: Destination::Document,
      accept: Some("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()),
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
    self.accept = Some(accept.into());
    self
  }

  pub fn accepts_html(&self) -> bool {
    self
      .accept
      .as_deref()
      .is_some_and(|accept| accept.contains("text/html"))
  }

  pub fn is_navigation(&self) -> bool {
    self.destination == Destination::Document || self.accepts_html()
  }

  /// The URL used as cache identity. Fragments never reach the server,
  /// so they are not part of it.
  pub fn cache_url(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.into()
  }
}

/// A response, either fresh from the network or replayed from a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    let status_text = StatusCode::from_u16(status)
      .ok()
      .and_then(|code| code.canonical_reason())
      .unwrap_or_default()
      .to_string();

    Self {
      status,
      status_text,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// A JSON response with the matching content type.
  pub fn json(status: u16, value: &serde_json::Value) -> Self {
    Self::new(status, value.to_string()).with_header("content-type", "application/json")
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  /// 2xx, the same test as `Response.ok` in the fetch API.
  pub fn is_ok(&self) -> bool {
    (200..=299).contains(&self.status)
  }

  /// Whether this response may be written to a partition.
  ///
  /// Partial content is excluded: a 206 body cannot answer a full request.
  pub fn is_cacheable(&self) -> bool {
    self.is_ok() && self.status != StatusCode::PARTIAL_CONTENT.as_u16()
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ok_covers_only_2xx() {
    assert!(Response::new(200, "").is_ok());
    assert!(Response::new(204, "").is_ok());
    assert!(!Response::new(301, "").is_ok());
    assert!(!Response::new(404, "").is_ok());
    assert!(!Response::new(503, "").is_ok());
  }

  #[test]
  fn partial_content_is_not_cacheable() {
    assert!(Response::new(206, "").is_ok());
    assert!(!Response::new(206, "").is_cacheable());
    assert!(Response::new(200, "").is_cacheable());
  }

  #[test]
  fn status_text_comes_from_status() {
    assert_eq!(Response::new(503, "").status_text, "Service Unavailable");
  }

  #[test]
  fn header_lookup_ignores_case() {
    let response = Response::json(200, &serde_json::json!({"a": 1}));
    assert_eq!(response.header("Content-Type"), Some("application/json"));
  }

  #[test]
  fn cache_url_drops_fragment() {
    let url = Url::parse("https://flow.app/dashboard#programs").unwrap();
    assert_eq!(Request::get(url).cache_url(), "https://flow.app/dashboard");
  }

  #[test]
  fn navigation_detection() {
    let url = Url::parse("https://flow.app/").unwrap();
    assert!(Request::navigate(url.clone()).is_navigation());
    assert!(Request::get(url.clone()).with_accept("text/html").is_navigation());
    assert!(!Request::get(url).with_accept("application/json").is_navigation());
  }

  #[test]
  fn destination_parses_case_insensitively() {
    assert_eq!("Image".parse::<Destination>(), Ok(Destination::Image));
    assert!("video".parse::<Destination>().is_err());
  }
}
