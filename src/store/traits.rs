//! Core types and the storage trait for the generation store.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::net::{Method, Request, Response, ResponseKind};

/// Lookup identity for a cached entry: method + URL.
///
/// Two requests with the same method and URL collide by design; the most
/// recent write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestKey {
  method: Method,
  url: String,
}

impl RequestKey {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
    }
  }

  pub fn from_request(req: &Request) -> Self {
    Self::new(req.method, req.url.clone())
  }

  pub fn method(&self) -> Method {
    self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// SHA256 hash for stable, fixed-length storage keys.
  pub fn hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for logs.
  pub fn description(&self) -> String {
    format!("{} {}", self.method.as_str(), self.url)
  }
}

/// A cached response body plus the metadata needed to replay it.
#[derive(Debug, Clone)]
pub struct StoredResponse {
  pub kind: ResponseKind,
  pub status: u16,
  pub status_text: String,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
  pub cached_at: DateTime<Utc>,
}

impl StoredResponse {
  pub fn from_response(resp: &Response) -> Self {
    Self {
      kind: resp.kind,
      status: resp.status,
      status_text: resp.status_text.clone(),
      headers: resp.headers.clone(),
      body: resp.body.clone(),
      cached_at: Utc::now(),
    }
  }

  /// Replay as a live response for the given request URL.
  pub fn to_response(&self, url: &str) -> Response {
    Response {
      kind: self.kind,
      url: url.to_string(),
      status: self.status,
      status_text: self.status_text.clone(),
      headers: self.headers.clone(),
      body: self.body.clone(),
    }
  }
}

/// Trait for generation store backends.
///
/// Writes are last-write-wins per `(tag, key)`. Writing to a tag that was
/// never opened registers it implicitly; `open_generation` exists so
/// install can create an empty generation before populating it.
pub trait GenerationStore: Send + Sync {
  /// Create the generation for a tag if it does not exist.
  fn open_generation(&self, tag: &str) -> Result<()>;

  /// All generation tags currently held, in creation order.
  fn list_generations(&self) -> Result<Vec<String>>;

  /// Destroy a generation and every entry in it.
  /// Returns whether the generation existed.
  fn delete_generation(&self, tag: &str) -> Result<bool>;

  /// Look up an entry in a generation.
  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<StoredResponse>>;

  /// Store an entry, replacing any previous entry for the same key.
  fn put(&self, tag: &str, key: &RequestKey, response: &StoredResponse) -> Result<()>;

  /// Number of entries held by a generation.
  fn entry_count(&self, tag: &str) -> Result<u64>;
}
