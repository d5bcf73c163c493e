//! Request/response wire types and the network fetch seam.
//!
//! The gateway never talks to the network directly; it goes through the
//! [`Fetcher`] trait so the serving policy can be exercised against a mock
//! with call counting.

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::future::Future;
use url::Url;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
  #[default]
  Get,
  Post,
  Put,
  Delete,
  Patch,
  Head,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Get => "GET",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Delete => "DELETE",
      Self::Patch => "PATCH",
      Self::Head => "HEAD",
      Self::Options => "OPTIONS",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Ok(Self::Get),
      "POST" => Ok(Self::Post),
      "PUT" => Ok(Self::Put),
      "DELETE" => Ok(Self::Delete),
      "PATCH" => Ok(Self::Patch),
      "HEAD" => Ok(Self::Head),
      "OPTIONS" => Ok(Self::Options),
      other => Err(eyre!("Unknown HTTP method: {}", other)),
    }
  }
}

/// An intercepted request.
///
/// `navigate` marks top-level document loads, which get the offline-shell
/// fallback instead of a synthetic 503 when the network is down.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: String,
  pub method: Method,
  pub navigate: bool,
}

impl Request {
  pub fn new(url: impl Into<String>, method: Method) -> Self {
    Self {
      url: url.into(),
      method,
      navigate: false,
    }
  }

  /// Shorthand for a plain GET subresource request.
  pub fn get(url: impl Into<String>) -> Self {
    Self::new(url, Method::Get)
  }

  pub fn navigation(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: Method::Get,
      navigate: true,
    }
  }
}

/// Where a response sits in the trust model.
///
/// Only `Basic` responses are eligible for the runtime refill path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  /// Same-origin response; body and status are fully visible.
  Basic,
  /// Cross-origin response fetched without credentials.
  Opaque,
  /// Synthetic failure response produced by the gateway itself.
  Error,
}

impl ResponseKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Basic => "basic",
      Self::Opaque => "opaque",
      Self::Error => "error",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "basic" => Ok(Self::Basic),
      "opaque" => Ok(Self::Opaque),
      "error" => Ok(Self::Error),
      other => Err(eyre!("Unknown response kind: {}", other)),
    }
  }
}

/// A response flowing back to the caller of an intercepted request.
#[derive(Debug, Clone)]
pub struct Response {
  pub kind: ResponseKind,
  pub url: String,
  pub status: u16,
  pub status_text: String,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn ok(&self) -> bool {
    self.status >= 200 && self.status < 300
  }

  /// The synthetic response served when a non-navigation request fails
  /// with no cached match.
  pub fn offline() -> Self {
    Self {
      kind: ResponseKind::Error,
      url: String::new(),
      status: 503,
      status_text: "Service Unavailable".to_string(),
      headers: BTreeMap::new(),
      body: b"Offline".to_vec(),
    }
  }
}

/// Network side of the serving policy.
pub trait Fetcher: Send + Sync {
  /// Perform the network fetch for a request.
  ///
  /// `Err` means the network itself failed (unreachable, DNS, aborted).
  /// HTTP error statuses are `Ok` responses like any other.
  fn fetch(&self, req: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Classify a delivered response by its final URL's origin.
///
/// Cross-origin redirect hops end up `Opaque` because the final origin is
/// what determines visibility.
fn classify(origin: &Url, final_url: &Url) -> ResponseKind {
  if final_url.origin() == origin.origin() {
    ResponseKind::Basic
  } else {
    ResponseKind::Opaque
  }
}

/// Real fetcher backed by reqwest.
///
/// No timeout is configured; the platform defaults apply, matching the
/// upstream behavior this gateway replaces.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  origin: Url,
}

impl HttpFetcher {
  /// Build a fetcher for the given same-origin base.
  ///
  /// No cookie store is attached, so cross-origin requests go out without
  /// credentials.
  pub fn new(origin: &str) -> Result<Self> {
    let origin =
      Url::parse(origin).map_err(|e| eyre!("Invalid origin URL {}: {}", origin, e))?;
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }

  fn method_for(method: Method) -> reqwest::Method {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
      Method::Patch => reqwest::Method::PATCH,
      Method::Head => reqwest::Method::HEAD,
      Method::Options => reqwest::Method::OPTIONS,
    }
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, req: &Request) -> impl Future<Output = Result<Response>> + Send {
    let target = Url::parse(&req.url);
    let client = self.client.clone();
    let origin = self.origin.clone();
    let method = Self::method_for(req.method);
    let url = req.url.clone();

    async move {
      let target = target.map_err(|e| eyre!("Invalid request URL {}: {}", url, e))?;

      let response = client
        .request(method, target)
        .send()
        .await
        .map_err(|e| eyre!("Network fetch failed for {}: {}", url, e))?;

      let kind = classify(&origin, response.url());
      let status = response.status().as_u16();
      let status_text = response
        .status()
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string();
      let final_url = response.url().to_string();

      let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
          value
            .to_str()
            .ok()
            .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read response body for {}: {}", url, e))?
        .to_vec();

      Ok(Response {
        kind,
        url: final_url,
        status,
        status_text,
        headers,
        body,
      })
    }
  }
}
