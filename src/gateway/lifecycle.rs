//! Generation lifecycle: install populates the current generation from the
//! precache manifest, activate destroys superseded generations.

use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use tracing::{info, warn};

use super::{Gateway, PRECACHE_CONCURRENCY};
use crate::net::{Fetcher, Request, ResponseKind};
use crate::store::{GenerationStore, RequestKey, StoredResponse};

/// Lifecycle states of a gateway instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
  /// Constructed, no event delivered yet.
  #[default]
  Parsed,
  /// Install in progress.
  Installing,
  /// Installed, waiting to activate.
  Installed,
  /// Activate in progress.
  Activating,
  /// Active; the generation for the current tag is the only one left.
  Activated,
  /// Superseded by a newer version. A CLI run never observes this on its
  /// own instance; it exists so state reporting covers the full lifecycle.
  #[allow(dead_code)]
  Redundant,
}

impl<S: GenerationStore + 'static, F: Fetcher> Gateway<S, F> {
  pub fn state(&self) -> WorkerState {
    *self.state.lock().expect("state lock poisoned")
  }

  fn advance(&self, from: &[WorkerState], to: WorkerState) -> Result<()> {
    let mut state = self.state.lock().expect("state lock poisoned");
    if !from.contains(&state) {
      return Err(eyre!(
        "Invalid lifecycle transition: {:?} -> {:?}",
        *state,
        to
      ));
    }
    *state = to;
    Ok(())
  }

  /// Populate the generation for the current version tag.
  ///
  /// Each manifest entry is fetched independently; a failing entry is
  /// logged and skipped, never aborting its siblings. Install succeeds
  /// even if every entry fails.
  pub async fn install(&self) -> Result<()> {
    self.advance(&[WorkerState::Parsed], WorkerState::Installing)?;

    info!(version = %self.version, entries = self.manifest.len(), "installing generation");
    self.store.open_generation(&self.version)?;

    futures::stream::iter(self.manifest.iter())
      .for_each_concurrent(PRECACHE_CONCURRENCY, |url| async move {
        self.precache_one(url).await;
      })
      .await;

    self.advance(&[WorkerState::Installing], WorkerState::Installed)?;
    info!(version = %self.version, "generation installed");
    Ok(())
  }

  async fn precache_one(&self, url: &str) {
    let req = Request::get(url);
    match self.fetcher.fetch(&req).await {
      Ok(resp) => {
        // Opaque responses are stored as-is; their status cannot be
        // trusted. Same-origin entries must actually be ok.
        if resp.kind == ResponseKind::Opaque || resp.ok() {
          let key = RequestKey::from_request(&req);
          if let Err(e) = self.store.put(&self.version, &key, &StoredResponse::from_response(&resp)) {
            warn!(url = %url, error = %e, "failed to store precache entry");
          }
        } else {
          warn!(url = %url, status = resp.status, "precache entry returned an error status, skipping");
        }
      }
      Err(e) => {
        warn!(url = %url, error = %e, "failed to precache entry");
      }
    }
  }

  /// Destroy every generation whose tag is not the current version.
  ///
  /// This completes before the gateway reports itself active, so new
  /// traffic is never served alongside stale generations.
  pub async fn activate(&self) -> Result<()> {
    // A freshly constructed instance may receive activate directly when
    // its generation was populated by an earlier run.
    self.advance(
      &[WorkerState::Parsed, WorkerState::Installed],
      WorkerState::Activating,
    )?;

    for tag in self.store.list_generations()? {
      if tag != self.version {
        info!(stale = %tag, current = %self.version, "deleting superseded generation");
        self.store.delete_generation(&tag)?;
      }
    }

    self.advance(&[WorkerState::Activating], WorkerState::Activated)?;
    info!(version = %self.version, "gateway active");
    Ok(())
  }
}
