//! Offline cache gateway.
//!
//! Owns the generation lifecycle (install, activate, prune), the
//! cache-first serving policy, and the sync/push bridges. All dependencies
//! (store, fetcher, sinks) are injected; there is no global registration
//! state.

mod events;
mod lifecycle;
mod push;
mod serve;
mod sync;
#[cfg(test)]
pub(crate) mod testutil;

pub use events::{EventOutcome, GatewayEvent, Worker};
pub use lifecycle::WorkerState;
pub use push::{LogSink, Notification, NotificationSink, PushBridge};
pub use sync::{LogSyncHandler, SyncBridge, SyncHandler};

use color_eyre::Result;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::net::Fetcher;
use crate::store::GenerationStore;

/// How many precache fetches run at once during install.
const PRECACHE_CONCURRENCY: usize = 8;

/// The gateway instance for one deployed version.
///
/// A new deploy constructs a new gateway with a bumped version tag; the
/// old generation is destroyed when the new instance activates.
pub struct Gateway<S: GenerationStore, F: Fetcher> {
  store: Arc<S>,
  fetcher: F,
  /// Version tag identifying the current generation.
  version: String,
  /// Absolute URLs populated at install time.
  manifest: Vec<String>,
  /// Absolute URL of the document served to offline navigations.
  shell_url: String,
  state: Mutex<WorkerState>,
  /// In-flight background cache refills. Production code never blocks on
  /// these; tests drain them via [`Gateway::drain_refills`].
  refills: tokio::sync::Mutex<JoinSet<()>>,
}

impl<S: GenerationStore + 'static, F: Fetcher> Gateway<S, F> {
  pub fn new(config: &Config, store: S, fetcher: F) -> Result<Self> {
    Ok(Self {
      store: Arc::new(store),
      fetcher,
      version: config.version.clone(),
      manifest: config.resolved_manifest()?,
      shell_url: config.shell_url()?,
      state: Mutex::new(WorkerState::Parsed),
      refills: tokio::sync::Mutex::new(JoinSet::new()),
    })
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  #[cfg(test)]
  pub(crate) fn fetcher(&self) -> &F {
    &self.fetcher
  }
}
