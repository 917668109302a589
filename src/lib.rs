//! Offline request cache and background sync controller for the Flow app.
//!
//! Intercepted requests are classified by [`router::Router`], resolved by one
//! of the strategies in [`cache::CacheLayer`] against versioned SQLite
//! partitions, and the whole thing is driven through [`worker::Worker`]'s
//! event dispatch.

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod messages;
pub mod net;
pub mod notify;
pub mod router;
pub mod worker;
