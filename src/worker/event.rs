use serde_json::Value;

use super::background::ClickOutcome;
use super::fetch::FetchOutcome;
use crate::clients::ClientId;
use crate::messages::StatusMessage;
use crate::net::Request;
use crate::notify::Notification;

/// Events the host delivers to the worker
#[derive(Debug)]
pub enum Event {
  Install,
  Activate,
  Fetch(Request),
  /// Control message from a page
  Message {
    data: Value,
    source: Option<ClientId>,
  },
  /// Background sync fired. `queue_length` is the hint the page stored
  /// when it registered the sync.
  Sync { tag: String, queue_length: usize },
  Push { payload: Option<Vec<u8>> },
  NotificationClick {
    notification_id: u64,
    action: Option<String>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  Install,
  Activate,
  Fetch,
  Message,
  Sync,
  Push,
  NotificationClick,
}

impl Event {
  pub fn kind(&self) -> EventKind {
    match self {
      Self::Install => EventKind::Install,
      Self::Activate => EventKind::Activate,
      Self::Fetch(_) => EventKind::Fetch,
      Self::Message { .. } => EventKind::Message,
      Self::Sync { .. } => EventKind::Sync,
      Self::Push { .. } => EventKind::Push,
      Self::NotificationClick { .. } => EventKind::NotificationClick,
    }
  }
}

impl std::fmt::Display for EventKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Install => "install",
      Self::Activate => "activate",
      Self::Fetch => "fetch",
      Self::Message => "message",
      Self::Sync => "sync",
      Self::Push => "push",
      Self::NotificationClick => "notificationclick",
    };
    f.write_str(name)
  }
}

/// What a handler produced
#[derive(Debug)]
pub enum Outcome {
  /// Number of precached assets
  Installed(usize),
  /// Deleted partitions
  Activated(Vec<String>),
  Fetch(FetchOutcome),
  Reply(Option<StatusMessage>),
  /// The message posted to pages, if the tag was known
  Synced(Option<StatusMessage>),
  Notified(Notification),
  Clicked(ClickOutcome),
}
