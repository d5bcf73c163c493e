//! Shared fixtures for gateway tests: a canned-response fetcher with call
//! counting, and a small config.

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::Gateway;
use crate::config::{Config, NotificationConfig};
use crate::net::{Fetcher, Request, Response, ResponseKind};
use crate::store::GenerationStore;

#[derive(Default)]
struct MockInner {
  responses: Mutex<BTreeMap<String, Response>>,
  calls: AtomicUsize,
}

/// Fetcher serving canned responses by URL.
///
/// URLs with no canned response behave as a network failure, so an empty
/// mock models a fully offline network.
#[derive(Clone, Default)]
pub struct MockFetcher {
  inner: Arc<MockInner>,
}

impl MockFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond_basic(&self, url: &str, status: u16, body: &[u8]) {
    self.canned(url, ResponseKind::Basic, status, body);
  }

  pub fn respond_opaque(&self, url: &str, body: &[u8]) {
    self.canned(url, ResponseKind::Opaque, 200, body);
  }

  fn canned(&self, url: &str, kind: ResponseKind, status: u16, body: &[u8]) {
    let resp = Response {
      kind,
      url: url.to_string(),
      status,
      status_text: if status == 200 { "OK" } else { "Error" }.to_string(),
      headers: BTreeMap::new(),
      body: body.to_vec(),
    };
    self
      .inner
      .responses
      .lock()
      .expect("mock lock poisoned")
      .insert(url.to_string(), resp);
  }

  /// How many network fetches were attempted.
  pub fn calls(&self) -> usize {
    self.inner.calls.load(Ordering::SeqCst)
  }
}

impl Fetcher for MockFetcher {
  fn fetch(&self, req: &Request) -> impl Future<Output = Result<Response>> + Send {
    self.inner.calls.fetch_add(1, Ordering::SeqCst);
    let canned = self
      .inner
      .responses
      .lock()
      .expect("mock lock poisoned")
      .get(&req.url)
      .cloned();
    let url = req.url.clone();

    async move { canned.ok_or_else(|| eyre!("Network fetch failed for {}: connection refused", url)) }
  }
}

/// Config with a short manifest against a local origin.
pub fn test_config(version: &str) -> Config {
  Config {
    version: version.to_string(),
    origin: "http://localhost:8080".to_string(),
    offline_shell: "/".to_string(),
    precache: vec![
      "/".to_string(),
      "/components".to_string(),
      "/forms".to_string(),
      "/css/styles.css".to_string(),
      "/js/dashboard.js".to_string(),
      "https://cdn.tailwindcss.com".to_string(),
    ],
    notification: NotificationConfig::default(),
  }
}

pub fn gateway_with<S: GenerationStore + 'static, F: Fetcher>(
  config: &Config,
  store: S,
  fetcher: F,
) -> Gateway<S, F> {
  Gateway::new(config, store, fetcher).expect("test gateway config is valid")
}
