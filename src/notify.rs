//! Push payloads and the notifications they produce.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::NotificationDefaults;

/// Action buttons shown on every notification.
pub const VIEW_ACTION: &str = "view";
pub const DISMISS_ACTION: &str = "dismiss";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
  pub id: u64,
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub tag: Option<String>,
  pub data: Value,
  pub actions: Vec<NotificationAction>,
}

/// Push message body. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub icon: Option<String>,
  pub badge: Option<String>,
  pub tag: Option<String>,
  pub data: Option<Value>,
}

impl PushPayload {
  /// Parse a push body field by field. Anything that is not a JSON object
  /// yields an empty payload; a missing, empty or mistyped field is absent
  /// without affecting the others.
  pub fn parse(body: Option<&[u8]>) -> Self {
    let Some(body) = body.filter(|b| !b.is_empty()) else {
      return Self::default();
    };

    let fields = match serde_json::from_slice::<Value>(body) {
      Ok(Value::Object(fields)) => fields,
      Ok(other) => {
        warn!(kind = json_kind(&other), "Push payload is not an object, using defaults");
        return Self::default();
      }
      Err(err) => {
        warn!(error = %err, "Unparsable push payload, using defaults");
        return Self::default();
      }
    };

    let text = |name: &str| match fields.get(name) {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) if s.is_empty() => None,
      Some(Value::String(s)) => Some(s.clone()),
      Some(other) => {
        warn!(field = name, kind = json_kind(other), "Ignoring mistyped push field");
        None
      }
    };

    Self {
      title: text("title"),
      body: text("body"),
      icon: text("icon"),
      badge: text("badge"),
      tag: text("tag"),
      data: fields.get("data").filter(|v| !v.is_null()).cloned(),
    }
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Notifications currently on screen.
#[derive(Default)]
pub struct NotificationCenter {
  shown: Mutex<Vec<Notification>>,
  next_id: AtomicU64,
}

impl NotificationCenter {
  pub fn new() -> Self {
    Self::default()
  }

  fn shown(&self) -> MutexGuard<'_, Vec<Notification>> {
    self.shown.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Display a notification built from `payload`, filling gaps from
  /// `defaults`. A notification with the same tag replaces the old one.
  pub fn show(&self, payload: PushPayload, defaults: &NotificationDefaults) -> Notification {
    let notification = Notification {
      id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
      title: payload.title.unwrap_or_else(|| defaults.title.clone()),
      body: payload.body.unwrap_or_else(|| defaults.body.clone()),
      icon: payload.icon.unwrap_or_else(|| defaults.icon.clone()),
      badge: payload.badge.unwrap_or_else(|| defaults.badge.clone()),
      tag: payload.tag,
      data: payload.data.unwrap_or(Value::Null),
      actions: vec![
        NotificationAction {
          action: VIEW_ACTION.to_string(),
          title: "View".to_string(),
        },
        NotificationAction {
          action: DISMISS_ACTION.to_string(),
          title: "Dismiss".to_string(),
        },
      ],
    };

    let mut shown = self.shown();
    if let Some(tag) = &notification.tag {
      shown.retain(|n| n.tag.as_ref() != Some(tag));
    }
    shown.push(notification.clone());
    notification
  }

  pub fn close(&self, id: u64) -> Option<Notification> {
    let mut shown = self.shown();
    let index = shown.iter().position(|n| n.id == id)?;
    Some(shown.remove(index))
  }

  pub fn active(&self) -> Vec<Notification> {
    self.shown().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn payload_fields_override_defaults() {
    let center = NotificationCenter::new();
    let payload = PushPayload::parse(Some(br#"{"title":"Hi","body":"Test"}"#));

    let shown = center.show(payload, &NotificationDefaults::default());

    assert_eq!(shown.title, "Hi");
    assert_eq!(shown.body, "Test");
    assert_eq!(shown.icon, "/icons/icon-192x192.png");
    assert_eq!(center.active().len(), 1);
  }

  #[test]
  fn empty_or_garbage_payload_uses_defaults() {
    assert_eq!(PushPayload::parse(None), PushPayload::default());
    assert_eq!(PushPayload::parse(Some(b"")), PushPayload::default());
    assert_eq!(PushPayload::parse(Some(b"not json")), PushPayload::default());
    assert_eq!(PushPayload::parse(Some(b"[1,2]")), PushPayload::default());
  }

  #[test]
  fn mistyped_field_only_drops_itself() {
    let payload = PushPayload::parse(Some(br#"{"title":"Deadline","body":"Due","tag":7}"#));

    assert_eq!(payload.title.as_deref(), Some("Deadline"));
    assert_eq!(payload.body.as_deref(), Some("Due"));
    assert_eq!(payload.tag, None);

    let shown = NotificationCenter::new().show(payload, &NotificationDefaults::default());
    assert_eq!(shown.title, "Deadline");
    assert_eq!(shown.body, "Due");
  }

  #[test]
  fn empty_strings_fall_back_to_defaults() {
    let defaults = NotificationDefaults::default();
    let payload = PushPayload::parse(Some(br#"{"title":"","body":"","icon":null}"#));
    assert_eq!(payload, PushPayload::default());

    let shown = NotificationCenter::new().show(payload, &defaults);
    assert_eq!(shown.title, defaults.title);
    assert_eq!(shown.body, defaults.body);
    assert_eq!(shown.icon, defaults.icon);
  }

  #[test]
  fn data_is_kept_as_is() {
    let payload = PushPayload::parse(Some(br#"{"data":{"url":"/applications/3"}}"#));
    assert_eq!(payload.data, Some(serde_json::json!({"url": "/applications/3"})));
  }

  #[test]
  fn same_tag_replaces_notification() {
    let center = NotificationCenter::new();
    let defaults = NotificationDefaults::default();
    let tagged = || PushPayload {
      tag: Some("deadline".to_string()),
      ..PushPayload::default()
    };

    center.show(tagged(), &defaults);
    let second = center.show(tagged(), &defaults);

    assert_eq!(center.active(), vec![second]);
  }

  #[test]
  fn close_removes_notification() {
    let center = NotificationCenter::new();
    let shown = center.show(PushPayload::default(), &NotificationDefaults::default());

    assert_eq!(center.close(shown.id).map(|n| n.id), Some(shown.id));
    assert!(center.active().is_empty());
    assert!(center.close(shown.id).is_none());
  }
}
