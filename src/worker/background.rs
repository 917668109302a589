//! Background sync, push and notification clicks.
//!
//! The worker never replays queued writes itself: the offline queue lives in
//! page storage, so sync events are only relayed to open pages.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::Worker;
use crate::cache::CacheStorage;
use crate::clients::ClientId;
use crate::messages::StatusMessage;
use crate::net::Fetch;
use crate::notify::{Notification, PushPayload, DISMISS_ACTION};

pub const PROCESS_OFFLINE_QUEUE_TAG: &str = "process-offline-queue";
pub const SYNC_USER_DATA_TAG: &str = "sync-user-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
  Dismissed,
  /// An open page within the scope was focused
  Focused(ClientId),
  /// No page was open; the host should open this URL
  OpenWindow(Url),
}

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  /// Relay a sync event to every open page. Unknown tags are ignored.
  pub fn handle_sync(&self, tag: &str, queue_length: usize) -> Option<StatusMessage> {
    let message = match tag {
      PROCESS_OFFLINE_QUEUE_TAG => StatusMessage::ProcessOfflineQueue { queue_length },
      SYNC_USER_DATA_TAG => StatusMessage::SyncUserData {
        timestamp: Utc::now().timestamp_millis(),
      },
      other => {
        debug!(tag = other, "Ignoring unknown sync tag");
        return None;
      }
    };

    let delivered = self.clients.post_all(message.clone());
    info!(tag, delivered, "Sync relayed to clients");
    Some(message)
  }

  pub fn handle_push(&self, payload: Option<&[u8]>) -> Notification {
    let payload = PushPayload::parse(payload);
    let notification = self.notifications.show(payload, &self.config.notification);
    info!(id = notification.id, title = %notification.title, "Notification shown");
    notification
  }

  /// `dismiss` just closes the notification. Anything else also brings the
  /// app to the front: an open page if there is one, else a new window at
  /// the notification's `data.url` (or the scope root).
  pub fn handle_notification_click(
    &self,
    notification_id: u64,
    action: Option<&str>,
  ) -> ClickOutcome {
    let notification = self.notifications.close(notification_id);

    if action == Some(DISMISS_ACTION) {
      return ClickOutcome::Dismissed;
    }

    if let Some(id) = self.clients.focus_matching(self.scope.as_str()) {
      return ClickOutcome::Focused(id);
    }

    let target = notification
      .as_ref()
      .and_then(|n| n.data.get("url"))
      .and_then(Value::as_str)
      .and_then(|url| self.scope.join(url).ok())
      .unwrap_or_else(|| self.scope.clone());
    ClickOutcome::OpenWindow(target)
  }
}
