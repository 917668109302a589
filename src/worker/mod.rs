//! The offline cache and sync controller.
//!
//! A `Worker` owns everything a handler needs (config, partitions, network,
//! open pages, notifications) and is passed explicitly to each event. Events
//! are dispatched by kind; see [`Event`].

mod background;
mod control;
mod event;
mod fetch;
mod lifecycle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use color_eyre::Result;
use tokio::task::JoinHandle;
use tracing::Instrument;
use url::Url;

use crate::cache::{CacheLayer, CacheStorage, PartitionNames};
use crate::clients::Clients;
use crate::config::Config;
use crate::error::WorkerError;
use crate::net::Fetch;
use crate::notify::NotificationCenter;
use crate::router::Router;

pub use background::{ClickOutcome, PROCESS_OFFLINE_QUEUE_TAG, SYNC_USER_DATA_TAG};
pub use event::{Event, EventKind, Outcome};
pub use fetch::FetchOutcome;
pub use lifecycle::LifecycleState;

pub struct Worker<S: CacheStorage, N: Fetch> {
  config: Config,
  names: PartitionNames,
  scope: Url,
  offline_page: Url,
  placeholder_image: Url,
  router: Router,
  cache: CacheLayer<S, N>,
  clients: Arc<Clients>,
  notifications: Arc<NotificationCenter>,
  state: Mutex<LifecycleState>,
  skip_waiting: AtomicBool,
}

impl<S, N> Worker<S, N>
where
  S: CacheStorage + 'static,
  N: Fetch + 'static,
{
  pub fn new(config: Config, storage: Arc<S>, network: Arc<N>) -> Result<Self> {
    let scope = config.scope_url()?;
    let offline_page = scope.join(&config.offline_page)?;
    let placeholder_image = scope.join(&config.placeholder_image)?;

    Ok(Self {
      names: config.partition_names(),
      router: Router::new(&config),
      cache: CacheLayer::new(storage, network),
      clients: Arc::new(Clients::new()),
      notifications: Arc::new(NotificationCenter::new()),
      state: Mutex::new(LifecycleState::Parsed),
      skip_waiting: AtomicBool::new(false),
      config,
      scope,
      offline_page,
      placeholder_image,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn scope(&self) -> &Url {
    &self.scope
  }

  pub fn partition_names(&self) -> &PartitionNames {
    &self.names
  }

  pub fn cache(&self) -> &CacheLayer<S, N> {
    &self.cache
  }

  pub fn clients(&self) -> &Arc<Clients> {
    &self.clients
  }

  pub fn notifications(&self) -> &Arc<NotificationCenter> {
    &self.notifications
  }

  fn state_guard(&self) -> MutexGuard<'_, LifecycleState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn state(&self) -> LifecycleState {
    *self.state_guard()
  }

  /// Ask the host to activate this worker without waiting for old
  /// instances to go away.
  pub fn skip_waiting(&self) {
    self.skip_waiting.store(true, Ordering::SeqCst);
  }

  pub fn wants_skip_waiting(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }

  /// Run the handler registered for the event's kind.
  pub async fn dispatch(&self, event: Event) -> Result<Outcome, WorkerError> {
    let kind = event.kind();
    let span = tracing::info_span!("event", kind = %kind);

    async move {
      match event {
        Event::Install => self.install().await.map(Outcome::Installed),
        Event::Activate => self.activate().await.map(Outcome::Activated),
        Event::Fetch(request) => self.handle_fetch(&request).await.map(Outcome::Fetch),
        Event::Message { data, source } => self
          .handle_message(&data, source)
          .await
          .map(Outcome::Reply),
        Event::Sync { tag, queue_length } => {
          Ok(Outcome::Synced(self.handle_sync(&tag, queue_length)))
        }
        Event::Push { payload } => Ok(Outcome::Notified(self.handle_push(payload.as_deref()))),
        Event::NotificationClick {
          notification_id,
          action,
        } => Ok(Outcome::Clicked(
          self.handle_notification_click(notification_id, action.as_deref()),
        )),
      }
    }
    .instrument(span)
    .await
  }

  /// Handle an event on its own task, the way overlapping fetch events are
  /// scheduled independently of each other.
  pub fn spawn(self: &Arc<Self>, event: Event) -> JoinHandle<Result<Outcome, WorkerError>> {
    let worker = Arc::clone(self);
    tokio::spawn(async move { worker.dispatch(event).await })
  }
}
