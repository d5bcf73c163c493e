//! Host-runtime event surface.
//!
//! Every interception point is one variant of [`GatewayEvent`]; `dispatch`
//! awaits the handler to completion before returning, which is the
//! wait-until contract the host runtime expects.

use color_eyre::Result;

use super::push::{Notification, NotificationSink, PushBridge};
use super::sync::{SyncBridge, SyncHandler};
use super::Gateway;
use crate::net::{Fetcher, Request, Response};
use crate::store::GenerationStore;

/// An event delivered by the host runtime.
#[derive(Debug)]
pub enum GatewayEvent {
  Install,
  Activate,
  Fetch(Request),
  Sync { tag: String },
  Push { payload: Vec<u8> },
  NotificationClick { notification: Notification },
}

/// What a dispatched event produced.
#[derive(Debug)]
pub enum EventOutcome {
  /// Handler ran to completion with no value for the caller.
  Handled,
  /// A fetch event produced a response to serve.
  Response(Response),
}

/// One gateway instance wired to its bridges — the unit the host runtime
/// delivers events to.
pub struct Worker<S, F, H, N>
where
  S: GenerationStore + 'static,
  F: Fetcher,
  H: SyncHandler,
  N: NotificationSink,
{
  gateway: Gateway<S, F>,
  sync: SyncBridge<H>,
  push: PushBridge<N>,
}

impl<S, F, H, N> Worker<S, F, H, N>
where
  S: GenerationStore + 'static,
  F: Fetcher,
  H: SyncHandler,
  N: NotificationSink,
{
  pub fn new(gateway: Gateway<S, F>, sync: SyncBridge<H>, push: PushBridge<N>) -> Self {
    Self {
      gateway,
      sync,
      push,
    }
  }

  pub fn gateway(&self) -> &Gateway<S, F> {
    &self.gateway
  }

  pub fn sync(&self) -> &SyncBridge<H> {
    &self.sync
  }

  pub fn push(&self) -> &PushBridge<N> {
    &self.push
  }

  /// Deliver one event and await its handler to completion.
  pub async fn dispatch(&self, event: GatewayEvent) -> Result<EventOutcome> {
    match event {
      GatewayEvent::Install => {
        self.gateway.install().await?;
        Ok(EventOutcome::Handled)
      }
      GatewayEvent::Activate => {
        self.gateway.activate().await?;
        Ok(EventOutcome::Handled)
      }
      GatewayEvent::Fetch(req) => {
        let resp = self.gateway.handle_fetch(&req).await?;
        Ok(EventOutcome::Response(resp))
      }
      GatewayEvent::Sync { tag } => {
        self.sync.handle_sync(&tag).await?;
        Ok(EventOutcome::Handled)
      }
      GatewayEvent::Push { payload } => {
        self.push.handle_push(&payload).await?;
        Ok(EventOutcome::Handled)
      }
      GatewayEvent::NotificationClick { notification } => {
        self.push.handle_click(&notification).await?;
        Ok(EventOutcome::Handled)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::sync::LogSyncHandler;
  use crate::gateway::testutil::{gateway_with, test_config, MockFetcher};
  use crate::gateway::{LogSink, WorkerState};
  use crate::store::MemoryStore;

  fn worker(
    config: &crate::config::Config,
    fetcher: MockFetcher,
  ) -> Worker<MemoryStore, MockFetcher, LogSyncHandler, LogSink> {
    Worker::new(
      gateway_with(config, MemoryStore::new(), fetcher),
      SyncBridge::new(LogSyncHandler),
      PushBridge::new(LogSink, config.notification.clone()),
    )
  }

  #[tokio::test]
  async fn test_install_activate_fetch_end_to_end() {
    let config = test_config("v1");
    let fetcher = MockFetcher::new();
    for url in config.resolved_manifest().unwrap() {
      fetcher.respond_basic(&url, 200, b"asset");
    }

    let worker = worker(&config, fetcher.clone());
    worker.dispatch(GatewayEvent::Install).await.unwrap();
    worker.dispatch(GatewayEvent::Activate).await.unwrap();
    assert_eq!(worker.gateway().state(), WorkerState::Activated);

    let calls_after_install = fetcher.calls();
    let url = format!("{}/css/styles.css", config.origin);
    let outcome = worker
      .dispatch(GatewayEvent::Fetch(Request::get(&url)))
      .await
      .unwrap();
    match outcome {
      EventOutcome::Response(resp) => assert_eq!(resp.body, b"asset"),
      other => panic!("expected a response, got {:?}", other),
    }
    // Precached entry: serving it made no network call
    assert_eq!(fetcher.calls(), calls_after_install);
  }

  #[tokio::test]
  async fn test_sync_and_push_events() {
    let config = test_config("v1");
    let worker = worker(&config, MockFetcher::new());

    worker.sync().register("background-sync");
    let outcome = worker
      .dispatch(GatewayEvent::Sync {
        tag: "background-sync".to_string(),
      })
      .await
      .unwrap();
    assert!(matches!(outcome, EventOutcome::Handled));

    let outcome = worker
      .dispatch(GatewayEvent::Push {
        payload: b"hello".to_vec(),
      })
      .await
      .unwrap();
    assert!(matches!(outcome, EventOutcome::Handled));

    let note = worker.push().notification_for(b"hello");
    let outcome = worker
      .dispatch(GatewayEvent::NotificationClick { notification: note })
      .await
      .unwrap();
    assert!(matches!(outcome, EventOutcome::Handled));
  }
}
