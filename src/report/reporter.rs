//! Error capture, bounded diagnostic logging, and best-effort forwarding.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::classify::ErrorKind;
use crate::config::ClientConfig;
use crate::net::ApiError;
use crate::store::Store;

/// Key under which the serialized log collection is persisted.
const ERROR_LOGS_KEY: &str = "error_logs";
/// Trim threshold for the persisted log.
const LOG_CAP: usize = 50;
/// Entries kept after a trim, most recent first discarded last.
const LOG_KEEP: usize = 25;

/// One captured failure, persisted as part of the `error_logs` collection
/// and POSTed to the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
  pub message: String,
  pub stack: Option<String>,
  pub context: String,
  pub timestamp: DateTime<Utc>,
  pub user_agent: String,
  pub url: Option<String>,
}

/// Funnel for every failure the rest of the client cannot handle.
///
/// Each captured fault becomes a durable [`ErrorRecord`], a single
/// non-retried POST to the collector, and a short user-facing message for
/// the rendering layer's toasts.
pub struct ErrorReporter {
  store: Arc<Store>,
  http: reqwest::Client,
  report_url: Option<Url>,
  user_agent: String,
}

impl ErrorReporter {
  pub fn new(config: &ClientConfig, store: Arc<Store>) -> Result<Self> {
    let report_url = match &config.report_path {
      Some(path) => {
        let base = config.parse_base_url()?;
        let url = base
          .join(path)
          .map_err(|e| eyre!("Invalid report path {}: {}", path, e))?;
        Some(url)
      }
      None => None,
    };

    let http = reqwest::Client::builder()
      .user_agent(&config.user_agent)
      .timeout(config.request_timeout())
      .build()
      .map_err(|e| eyre!("Failed to build report client: {}", e))?;

    Ok(Self {
      store,
      http,
      report_url,
      user_agent: config.user_agent.clone(),
    })
  }

  /// Capture an arbitrary failure. Returns the message to show the user.
  pub async fn handle_error<E: std::fmt::Display>(&self, error: &E, context: &str) -> String {
    let message = error.to_string();
    let kind = ErrorKind::from_message(&message);
    self.capture(message, None, context, None, kind).await
  }

  /// Capture a failed API call. A 401 additionally forces logout: the
  /// stored token is stale and every further authenticated call would
  /// fail the same way.
  pub async fn handle_api_error(&self, error: &ApiError, endpoint: &str) -> String {
    if let ApiError::Status { status: 401, .. } = error {
      self.store.clear_auth_token();
    }

    let kind = ErrorKind::from(error);
    self
      .capture(
        error.to_string(),
        None,
        "api",
        Some(endpoint.to_string()),
        kind,
      )
      .await
  }

  async fn capture(
    &self,
    message: String,
    stack: Option<String>,
    context: &str,
    url: Option<String>,
    kind: ErrorKind,
  ) -> String {
    let record = ErrorRecord {
      message,
      stack,
      context: context.to_string(),
      timestamp: Utc::now(),
      user_agent: self.user_agent.clone(),
      url,
    };

    self.append_log(&record);
    self.forward(&record).await;
    kind.user_message().to_string()
  }

  /// Append to the persisted collection, trimming to the most recent
  /// [`LOG_KEEP`] once it grows past [`LOG_CAP`].
  fn append_log(&self, record: &ErrorRecord) {
    let mut logs = self.error_logs();
    logs.push(record.clone());
    if logs.len() > LOG_CAP {
      let drop = logs.len() - LOG_KEEP;
      logs.drain(..drop);
    }

    match serde_json::to_value(&logs) {
      Ok(value) => {
        self.store.set(ERROR_LOGS_KEY, value, None);
      }
      Err(e) => debug!(error = %e, "error log serialization failed"),
    }
  }

  /// One POST, no retry. A failure here is swallowed outright: the report
  /// pipeline must never feed its own failures back into itself.
  async fn forward(&self, record: &ErrorRecord) {
    let Some(url) = &self.report_url else { return };
    match self.http.post(url.clone()).json(record).send().await {
      Ok(_) => {}
      Err(e) => debug!(error = %e, "error report delivery failed"),
    }
  }

  /// The persisted diagnostic log, oldest first.
  pub fn error_logs(&self) -> Vec<ErrorRecord> {
    self
      .store
      .get(ERROR_LOGS_KEY)
      .and_then(|value| serde_json::from_value(value).ok())
      .unwrap_or_default()
  }

  /// Reset the persisted diagnostic log.
  pub fn clear_error_logs(&self) -> bool {
    self.store.remove(ERROR_LOGS_KEY)
  }

  /// Route panics into the capture pipeline, then delegate to the
  /// previously installed hook. The Rust analogue of a global uncaught
  /// handler; opt-in because the library owns no process entry point.
  pub fn install_panic_hook(self: Arc<Self>) {
    let reporter = self;
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
      let message = info
        .payload()
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_string());
      let location = info.location().map(|l| l.to_string());

      reporter.record_panic(message, location);
      previous(info);
    }));
  }

  fn record_panic(&self, message: String, location: Option<String>) {
    let record = ErrorRecord {
      message,
      stack: location,
      context: "panic".to_string(),
      timestamp: Utc::now(),
      user_agent: self.user_agent.clone(),
      url: None,
    };
    self.append_log(&record);

    // Forwarding needs a runtime; inside one, fire and forget
    if let (Ok(handle), Some(url)) = (
      tokio::runtime::Handle::try_current(),
      self.report_url.clone(),
    ) {
      let http = self.http.clone();
      handle.spawn(async move {
        if let Err(e) = http.post(url).json(&record).send().await {
          debug!(error = %e, "panic report delivery failed");
        }
      });
    }
  }
}
