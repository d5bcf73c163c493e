//! Background sync bridge.
//!
//! The page registers an opaque tag for deferred offline work; the host
//! delivers the tag again once connectivity is restored. What the replayed
//! work actually is lives behind [`SyncHandler`] — no payload format is
//! defined here, and nothing is persisted between runs.

use color_eyre::Result;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Replays the deferred work behind a sync tag.
pub trait SyncHandler: Send + Sync {
  /// Run the deferred work to completion.
  ///
  /// An `Err` asks the host runtime to deliver the tag again later.
  fn replay(&self, tag: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Handler that only records the replay; the CLI default, since no durable
/// action queue exists upstream of this gateway.
pub struct LogSyncHandler;

impl SyncHandler for LogSyncHandler {
  fn replay(&self, tag: &str) -> impl Future<Output = Result<()>> + Send {
    info!(tag = %tag, "replaying deferred work");
    async { Ok(()) }
  }
}

/// Bridges connectivity-restored signals to a [`SyncHandler`].
pub struct SyncBridge<H: SyncHandler> {
  handler: H,
  pending: Mutex<BTreeSet<String>>,
}

impl<H: SyncHandler> SyncBridge<H> {
  pub fn new(handler: H) -> Self {
    Self {
      handler,
      pending: Mutex::new(BTreeSet::new()),
    }
  }

  /// Queue a tag for replay on the next sync delivery.
  /// Returns false if the tag was already pending.
  pub fn register(&self, tag: &str) -> bool {
    self
      .pending
      .lock()
      .expect("pending lock poisoned")
      .insert(tag.to_string())
  }

  /// Handle a sync delivery for a tag.
  ///
  /// A pending tag is consumed exactly once. If the replay fails the tag
  /// is re-queued and the error returned, so the host can retry later.
  /// Unknown tags are a logged no-op; returns whether work ran.
  pub async fn handle_sync(&self, tag: &str) -> Result<bool> {
    let taken = self
      .pending
      .lock()
      .expect("pending lock poisoned")
      .remove(tag);

    if !taken {
      debug!(tag = %tag, "sync delivered for a tag with no pending work");
      return Ok(false);
    }

    match self.handler.replay(tag).await {
      Ok(()) => Ok(true),
      Err(e) => {
        warn!(tag = %tag, error = %e, "sync replay failed, re-queueing");
        self
          .pending
          .lock()
          .expect("pending lock poisoned")
          .insert(tag.to_string());
        Err(e)
      }
    }
  }

  /// Tags currently awaiting a sync delivery.
  #[allow(dead_code)]
  pub fn pending(&self) -> Vec<String> {
    self
      .pending
      .lock()
      .expect("pending lock poisoned")
      .iter()
      .cloned()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  struct CountingHandler {
    runs: AtomicUsize,
    fail_next: AtomicBool,
  }

  impl CountingHandler {
    fn new() -> Self {
      Self {
        runs: AtomicUsize::new(0),
        fail_next: AtomicBool::new(false),
      }
    }
  }

  impl SyncHandler for CountingHandler {
    fn replay(&self, _tag: &str) -> impl Future<Output = Result<()>> + Send {
      self.runs.fetch_add(1, Ordering::SeqCst);
      let fail = self.fail_next.swap(false, Ordering::SeqCst);
      async move {
        if fail {
          Err(eyre!("still offline"))
        } else {
          Ok(())
        }
      }
    }
  }

  #[tokio::test]
  async fn test_tag_consumed_exactly_once() {
    let bridge = SyncBridge::new(CountingHandler::new());
    assert!(bridge.register("background-sync"));
    assert!(!bridge.register("background-sync"));

    assert!(bridge.handle_sync("background-sync").await.unwrap());
    assert_eq!(bridge.handler.runs.load(Ordering::SeqCst), 1);

    // Second delivery finds nothing pending
    assert!(!bridge.handle_sync("background-sync").await.unwrap());
    assert_eq!(bridge.handler.runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_unknown_tag_is_noop() {
    let bridge = SyncBridge::new(CountingHandler::new());
    assert!(!bridge.handle_sync("unregistered").await.unwrap());
    assert_eq!(bridge.handler.runs.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failed_replay_requeues() {
    let bridge = SyncBridge::new(CountingHandler::new());
    bridge.register("background-sync");
    bridge.handler.fail_next.store(true, Ordering::SeqCst);

    assert!(bridge.handle_sync("background-sync").await.is_err());
    assert_eq!(bridge.pending(), vec!["background-sync".to_string()]);

    // Retry succeeds and consumes the tag
    assert!(bridge.handle_sync("background-sync").await.unwrap());
    assert!(bridge.pending().is_empty());
    assert_eq!(bridge.handler.runs.load(Ordering::SeqCst), 2);
  }
}
