//! Page clients the worker can talk to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::messages::StatusMessage;

pub type ClientId = u64;

/// What the worker knows about an open page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
  pub id: ClientId,
  pub url: String,
  pub focused: bool,
  /// Whether this worker controls the page
  pub controlled: bool,
}

struct ClientSlot {
  info: ClientInfo,
  tx: mpsc::UnboundedSender<StatusMessage>,
}

/// Registry of open pages and their message channels.
///
/// A page that dropped its receiver is forgotten on the next send.
#[derive(Default)]
pub struct Clients {
  slots: Mutex<Vec<ClientSlot>>,
  next_id: AtomicU64,
}

impl Clients {
  pub fn new() -> Self {
    Self::default()
  }

  fn slots(&self) -> MutexGuard<'_, Vec<ClientSlot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register an open page, returning its id and the channel it receives
  /// status messages on.
  pub fn connect(
    &self,
    url: impl Into<String>,
  ) -> (ClientId, mpsc::UnboundedReceiver<StatusMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let info = ClientInfo {
      id,
      url: url.into(),
      focused: false,
      controlled: false,
    };

    debug!(client = id, url = %info.url, "Client connected");
    self.slots().push(ClientSlot { info, tx });
    (id, rx)
  }

  pub fn disconnect(&self, id: ClientId) {
    self.slots().retain(|slot| slot.info.id != id);
  }

  pub fn list(&self) -> Vec<ClientInfo> {
    self.slots().iter().map(|slot| slot.info.clone()).collect()
  }

  /// Take control of every open page. Returns how many were claimed.
  pub fn claim(&self) -> usize {
    let mut slots = self.slots();
    for slot in slots.iter_mut() {
      slot.info.controlled = true;
    }
    slots.len()
  }

  pub fn post(&self, id: ClientId, message: StatusMessage) -> bool {
    let mut slots = self.slots();
    let Some(index) = slots.iter().position(|slot| slot.info.id == id) else {
      return false;
    };

    if slots[index].tx.send(message).is_ok() {
      true
    } else {
      slots.remove(index);
      false
    }
  }

  /// Send to every open page. Returns the number of pages reached.
  pub fn post_all(&self, message: StatusMessage) -> usize {
    let mut slots = self.slots();
    slots.retain(|slot| slot.tx.send(message.clone()).is_ok());
    slots.len()
  }

  /// Focus the first page within `scope`, if any.
  pub fn focus_matching(&self, scope: &str) -> Option<ClientId> {
    let mut slots = self.slots();
    slots.retain(|slot| !slot.tx.is_closed());

    let index = slots
      .iter()
      .position(|slot| slot.info.url.starts_with(scope))?;
    for (i, slot) in slots.iter_mut().enumerate() {
      slot.info.focused = i == index;
    }
    Some(slots[index].info.id)
  }
}
