//! Push notification bridge.
//!
//! Converts an inbound push payload into a displayed notification, and a
//! notification activation into an opened window. The actual display
//! surface sits behind [`NotificationSink`].

use color_eyre::Result;
use std::future::Future;
use tracing::{debug, info};

use crate::config::NotificationConfig;

/// What gets shown for a push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  /// De-duplication tag; a new notification with the same tag replaces
  /// the previous one.
  pub tag: String,
  /// Target opened when the notification is activated.
  pub url: String,
}

/// Display surface for notifications.
pub trait NotificationSink: Send + Sync {
  fn show(&self, note: &Notification) -> impl Future<Output = Result<()>> + Send;

  /// Dismiss any displayed notification with this tag.
  fn close(&self, tag: &str) -> impl Future<Output = Result<()>> + Send;

  /// Open or focus a window at the given URL.
  fn open_window(&self, url: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Sink that renders notifications into the log stream; the CLI default.
pub struct LogSink;

impl NotificationSink for LogSink {
  fn show(&self, note: &Notification) -> impl Future<Output = Result<()>> + Send {
    info!(title = %note.title, body = %note.body, tag = %note.tag, "notification shown");
    async { Ok(()) }
  }

  fn close(&self, tag: &str) -> impl Future<Output = Result<()>> + Send {
    info!(tag = %tag, "notification closed");
    async { Ok(()) }
  }

  fn open_window(&self, url: &str) -> impl Future<Output = Result<()>> + Send {
    info!(url = %url, "opening window");
    async { Ok(()) }
  }
}

/// Bridges push deliveries and notification clicks to a sink.
pub struct PushBridge<N: NotificationSink> {
  sink: N,
  defaults: NotificationConfig,
}

impl<N: NotificationSink> PushBridge<N> {
  pub fn new(sink: N, defaults: NotificationConfig) -> Self {
    Self { sink, defaults }
  }

  /// Build the notification for a raw push payload.
  ///
  /// An empty or undecodable payload falls back to the configured body;
  /// the notification is never dropped.
  pub fn notification_for(&self, payload: &[u8]) -> Notification {
    let body = if payload.is_empty() {
      self.defaults.body.clone()
    } else {
      match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => {
          debug!("push payload is not valid UTF-8, using fallback body");
          self.defaults.body.clone()
        }
      }
    };

    Notification {
      title: self.defaults.title.clone(),
      body,
      icon: self.defaults.icon.clone(),
      badge: self.defaults.badge.clone(),
      tag: self.defaults.tag.clone(),
      url: self.defaults.url.clone(),
    }
  }

  /// Handle an inbound push message.
  pub async fn handle_push(&self, payload: &[u8]) -> Result<()> {
    let note = self.notification_for(payload);
    self.sink.show(&note).await
  }

  /// Handle activation (click) of a displayed notification.
  pub async fn handle_click(&self, note: &Notification) -> Result<()> {
    self.sink.close(&note.tag).await?;
    let url = if note.url.is_empty() { "/" } else { &note.url };
    self.sink.open_window(url).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingSink {
    events: Mutex<Vec<String>>,
  }

  impl RecordingSink {
    fn events(&self) -> Vec<String> {
      self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
      self.events.lock().unwrap().push(event);
    }
  }

  impl NotificationSink for RecordingSink {
    fn show(&self, note: &Notification) -> impl Future<Output = Result<()>> + Send {
      self.record(format!("show:{}:{}", note.tag, note.body));
      async { Ok(()) }
    }

    fn close(&self, tag: &str) -> impl Future<Output = Result<()>> + Send {
      self.record(format!("close:{}", tag));
      async { Ok(()) }
    }

    fn open_window(&self, url: &str) -> impl Future<Output = Result<()>> + Send {
      self.record(format!("open:{}", url));
      async { Ok(()) }
    }
  }

  fn bridge() -> PushBridge<RecordingSink> {
    PushBridge::new(RecordingSink::default(), NotificationConfig::default())
  }

  #[tokio::test]
  async fn test_push_with_text_payload() {
    let bridge = bridge();
    bridge.handle_push(b"3 items need review").await.unwrap();
    let events = bridge.sink.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].ends_with(":3 items need review"));
  }

  #[tokio::test]
  async fn test_empty_payload_uses_fallback_body() {
    let bridge = bridge();
    let note = bridge.notification_for(b"");
    assert_eq!(note.body, NotificationConfig::default().body);
  }

  #[tokio::test]
  async fn test_undecodable_payload_still_notifies() {
    let bridge = bridge();
    bridge.handle_push(&[0xff, 0xfe, 0x80]).await.unwrap();
    let events = bridge.sink.events();
    assert_eq!(events.len(), 1, "notification must never be dropped");
    assert!(events[0].contains(&NotificationConfig::default().body));
  }

  #[test]
  fn test_descriptor_fields() {
    let bridge = bridge();
    let note = bridge.notification_for(b"hello");
    assert_eq!(note.icon, "/icon-192x192.png");
    assert_eq!(note.badge, "/badge-72x72.png");
    assert!(!note.tag.is_empty());
    assert_eq!(note.url, "/");
  }

  #[tokio::test]
  async fn test_click_closes_then_opens() {
    let bridge = bridge();
    let note = bridge.notification_for(b"hello");
    bridge.handle_click(&note).await.unwrap();
    let events = bridge.sink.events();
    assert_eq!(events, vec![format!("close:{}", note.tag), "open:/".to_string()]);
  }

  #[tokio::test]
  async fn test_click_with_empty_url_opens_root() {
    let bridge = bridge();
    let mut note = bridge.notification_for(b"hello");
    note.url = String::new();
    bridge.handle_click(&note).await.unwrap();
    assert!(bridge.sink.events().contains(&"open:/".to_string()));
  }
}
