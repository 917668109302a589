//! Structured `{ type, payload }` messages between page and worker.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page → worker control messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
  /// Activate right away instead of waiting for old clients to close
  SkipWaiting,
  /// Write `data` as a JSON response for `url` into `cache_name`
  CacheUpdate {
    cache_name: String,
    url: String,
    data: Value,
  },
  /// Delete one partition, or all of them
  ClearCache { cache_name: Option<String> },
  GetCacheStatus,
}

#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheUpdatePayload {
  cache_name: String,
  url: String,
  #[serde(default)]
  data: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearCachePayload {
  cache_name: Option<String>,
}

/// Why a message could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
  #[error("unknown message type {0:?}")]
  UnknownType(String),

  #[error("malformed message: {0}")]
  Malformed(#[from] serde_json::Error),
}

impl ControlMessage {
  pub fn parse(data: &Value) -> Result<Self, MessageError> {
    let envelope = Envelope::deserialize(data)?;

    match envelope.kind.as_str() {
      "SKIP_WAITING" => Ok(Self::SkipWaiting),
      "CACHE_UPDATE" => {
        let payload: CacheUpdatePayload = serde_json::from_value(envelope.payload)?;
        Ok(Self::CacheUpdate {
          cache_name: payload.cache_name,
          url: payload.url,
          data: payload.data,
        })
      }
      "CLEAR_CACHE" => {
        let payload: ClearCachePayload = payload_or_default(envelope.payload)?;
        Ok(Self::ClearCache {
          cache_name: payload.cache_name,
        })
      }
      "GET_CACHE_STATUS" => Ok(Self::GetCacheStatus),
      other => Err(MessageError::UnknownType(other.to_string())),
    }
  }
}

/// A missing payload means "no options".
fn payload_or_default<T: DeserializeOwned + Default>(payload: Value) -> serde_json::Result<T> {
  if payload.is_null() {
    Ok(T::default())
  } else {
    serde_json::from_value(payload)
  }
}

/// Worker → page status messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusMessage {
  /// The page should replay its queued writes
  ProcessOfflineQueue {
    #[serde(rename = "queueLength")]
    queue_length: usize,
  },
  /// The page should refresh user data; ms since the epoch
  SyncUserData { timestamp: i64 },
  /// Entry count per partition
  CacheStatus(BTreeMap<String, usize>),
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parses_cache_update() {
    let message = ControlMessage::parse(&json!({
      "type": "CACHE_UPDATE",
      "payload": {"cacheName": "flow-dynamic-v1", "url": "/api/me", "data": {"role": "student"}}
    }))
    .unwrap();

    assert_eq!(
      message,
      ControlMessage::CacheUpdate {
        cache_name: "flow-dynamic-v1".to_string(),
        url: "/api/me".to_string(),
        data: json!({"role": "student"}),
      }
    );
  }

  #[test]
  fn clear_cache_payload_is_optional() {
    assert_eq!(
      ControlMessage::parse(&json!({"type": "CLEAR_CACHE"})).unwrap(),
      ControlMessage::ClearCache { cache_name: None }
    );
    assert_eq!(
      ControlMessage::parse(&json!({"type": "CLEAR_CACHE", "payload": {"cacheName": "flow-images-v1"}}))
        .unwrap(),
      ControlMessage::ClearCache {
        cache_name: Some("flow-images-v1".to_string())
      }
    );
  }

  #[test]
  fn unknown_and_malformed_messages_are_errors() {
    assert!(matches!(
      ControlMessage::parse(&json!({"type": "RELOAD"})),
      Err(MessageError::UnknownType(t)) if t == "RELOAD"
    ));
    assert!(matches!(
      ControlMessage::parse(&json!({"type": "CACHE_UPDATE", "payload": {}})),
      Err(MessageError::Malformed(_))
    ));
    assert!(ControlMessage::parse(&json!("SKIP_WAITING")).is_err());
  }

  #[test]
  fn status_messages_use_type_and_payload() {
    let message = StatusMessage::ProcessOfflineQueue { queue_length: 3 };
    assert_eq!(
      serde_json::to_value(&message).unwrap(),
      json!({"type": "PROCESS_OFFLINE_QUEUE", "payload": {"queueLength": 3}})
    );

    let status = StatusMessage::CacheStatus(BTreeMap::from([("flow-static-v1".to_string(), 9)]));
    assert_eq!(
      serde_json::to_value(&status).unwrap(),
      json!({"type": "CACHE_STATUS", "payload": {"flow-static-v1": 9}})
    );
  }
}
