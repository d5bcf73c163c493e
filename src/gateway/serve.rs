//! Cache-first serving policy with network fallback and background refill.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::Gateway;
use crate::net::{Fetcher, Method, Request, Response, ResponseKind};
use crate::store::{GenerationStore, RequestKey, StoredResponse};

impl<S: GenerationStore + 'static, F: Fetcher> Gateway<S, F> {
  /// Serve one intercepted request.
  ///
  /// 1. Cache hit in the current generation: return it, no network call.
  /// 2. Miss: fetch. A Basic 200 is returned immediately while a clone is
  ///    stored in the background; anything else passes through unstored.
  /// 3. Network failure: navigations get the cached offline shell, other
  ///    requests get a synthetic 503.
  ///
  /// Errors out of here are store-read failures only; network failures are
  /// always converted into a served response.
  pub async fn handle_fetch(&self, req: &Request) -> Result<Response> {
    let key = RequestKey::from_request(req);

    if let Some(stored) = self.store.get(&self.version, &key)? {
      debug!(key = %key.description(), "cache hit");
      return Ok(stored.to_response(&req.url));
    }

    match self.fetcher.fetch(req).await {
      Ok(resp) => {
        if resp.kind == ResponseKind::Basic && resp.status == 200 {
          self.spawn_refill(key, StoredResponse::from_response(&resp)).await;
        }
        Ok(resp)
      }
      Err(e) => {
        debug!(key = %key.description(), error = %e, "network failed, falling back");
        if req.navigate {
          let shell_key = RequestKey::new(Method::Get, self.shell_url.clone());
          if let Some(shell) = self.store.get(&self.version, &shell_key)? {
            return Ok(shell.to_response(&self.shell_url));
          }
          // No cached shell either; the synthetic failure is all we have
        }
        Ok(Response::offline())
      }
    }
  }

  /// Store a response clone without blocking the caller.
  ///
  /// Failures are swallowed and logged; the original response was already
  /// handed back. Concurrent writes to the same key are last-write-wins.
  async fn spawn_refill(&self, key: RequestKey, stored: StoredResponse) {
    let store = Arc::clone(&self.store);
    let version = self.version.clone();

    let mut refills = self.refills.lock().await;
    refills.spawn(async move {
      if let Err(e) = store.put(&version, &key, &stored) {
        warn!(key = %key.description(), error = %e, "background cache refill failed");
      }
    });
  }

  /// Await every pending background refill.
  ///
  /// Test hook; production callers never block on refill completion.
  pub async fn drain_refills(&self) {
    let mut refills = self.refills.lock().await;
    while refills.join_next().await.is_some() {}
  }
}
