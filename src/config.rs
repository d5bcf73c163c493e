use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Version tag identifying the current cache generation. Bump on every
  /// deploy that changes any precached asset.
  pub version: String,
  /// Origin that local manifest paths resolve against; also the boundary
  /// for Basic vs Opaque response classification.
  pub origin: String,
  /// Path of the document served to navigations when the network is down.
  pub offline_shell: String,
  /// Ordered list of URLs populated into the generation at install time.
  /// Local paths or fully-qualified CDN URLs.
  pub precache: Vec<String>,
  pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub title: String,
  /// Body used when a push payload is empty or undecodable.
  pub body: String,
  pub icon: String,
  pub badge: String,
  /// De-duplication tag shared by all notifications from this gateway.
  pub tag: String,
  /// Target opened on notification click.
  pub url: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      title: "Dashboard".to_string(),
      body: "New notification from the dashboard".to_string(),
      icon: "/icon-192x192.png".to_string(),
      badge: "/badge-72x72.png".to_string(),
      tag: "dashboard-notification".to_string(),
      url: "/".to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      version: "dashboard-v1".to_string(),
      origin: "http://localhost:8080".to_string(),
      offline_shell: "/".to_string(),
      precache: vec![
        "/".to_string(),
        "/components".to_string(),
        "/forms".to_string(),
        "/css/styles.css".to_string(),
        "/js/dashboard.js".to_string(),
        "/js/modal.js".to_string(),
        "/js/notification.js".to_string(),
        "/js/form-validation.js".to_string(),
        "/js/ui-components.js".to_string(),
        "/js/form-inputs.js".to_string(),
        "https://cdn.tailwindcss.com".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/notyf/3.10.0/notyf.min.css".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/notyf/3.10.0/notyf.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/flatpickr/4.6.13/flatpickr.min.css".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/flatpickr/4.6.13/flatpickr.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/choices.js/10.2.0/choices.min.css".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/choices.js/10.2.0/choices.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/quill/1.3.7/quill.snow.min.css".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/quill/1.3.7/quill.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/sortablejs/1.15.0/Sortable.min.js".to_string(),
        "https://cdnjs.cloudflare.com/ajax/libs/Chart.js/4.4.0/chart.min.js".to_string(),
      ],
      notification: NotificationConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offgate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offgate/config.yaml
  ///
  /// With no file anywhere, the built-in defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offgate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offgate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Manifest entries as absolute URLs, local paths joined onto the origin.
  pub fn resolved_manifest(&self) -> Result<Vec<String>> {
    self
      .precache
      .iter()
      .map(|entry| self.resolve(entry))
      .collect()
  }

  /// Absolute URL of the offline shell document.
  pub fn shell_url(&self) -> Result<String> {
    self.resolve(&self.offline_shell)
  }

  /// Resolve a manifest entry or user-supplied path to an absolute URL.
  pub fn resolve(&self, entry: &str) -> Result<String> {
    match Url::parse(entry) {
      Ok(url) => Ok(url.to_string()),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        let base = Url::parse(&self.origin)
          .map_err(|e| eyre!("Invalid origin URL {}: {}", self.origin, e))?;
        let joined = base
          .join(entry)
          .map_err(|e| eyre!("Invalid manifest entry {}: {}", entry, e))?;
        Ok(joined.to_string())
      }
      Err(e) => Err(eyre!("Invalid manifest entry {}: {}", entry, e)),
    }
  }
}
