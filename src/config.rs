use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::retry::RetryConfig;

/// Client configuration. All fields have working defaults; hosts that need
/// to point at a different deployment load overrides from a YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// Base URL bare request paths are joined onto. A missing trailing
  /// slash is appended on parse, so the last path segment is never
  /// dropped by relative joins.
  pub base_url: String,
  /// Path error reports are POSTed to, relative to `base_url`.
  /// `None` disables remote error forwarding.
  pub report_path: Option<String>,
  /// User-Agent sent with every request and attached to error records.
  pub user_agent: String,
  /// Transport timeout, in seconds.
  pub request_timeout_secs: u64,
  /// Default lifetime for cached responses, in seconds.
  pub cache_ttl_secs: i64,
  /// When set, online requests retry transient transport failures with
  /// this policy. When `None`, retry stays opt-in at call sites.
  pub retry: Option<RetryConfig>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.reelkit.io/v1/".to_string(),
      report_path: Some("diagnostics/errors".to_string()),
      user_agent: concat!("reelkit/", env!("CARGO_PKG_VERSION")).to_string(),
      request_timeout_secs: 30,
      cache_ttl_secs: 3600,
      retry: None,
    }
  }
}

impl ClientConfig {
  /// Load configuration overrides from a YAML file.
  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: ClientConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Parsed base URL, normalized to end with a slash so relative joins
  /// keep the full path.
  pub fn parse_base_url(&self) -> Result<Url> {
    let mut raw = self.base_url.clone();
    if !raw.ends_with('/') {
      raw.push('/');
    }
    Url::parse(&raw).map_err(|e| eyre!("Invalid base URL {}: {}", self.base_url, e))
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn cache_ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache_ttl_secs)
  }
}
