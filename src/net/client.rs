//! API client: the single point through which the application reaches the
//! recommendation service.
//!
//! Adds bearer authentication from the store, a normalized success/error
//! envelope, and offline tolerance: transport failures while the host has
//! signalled "offline" are queued and replayed in order on reconnect.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::queue::{QueuedRequest, ReplayQueue};
use super::transport::{RequestOptions, Transport, TransportError, TransportResponse};
use crate::config::ClientConfig;
use crate::retry::{retry_operation, RetryConfig};
use crate::store::Store;

/// Normalized failure envelope for every client call. Expected faults are
/// returned as data; nothing here is thrown past the boundary.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
  /// Transport failed while offline; the request was queued for replay.
  #[error("offline: request queued for replay")]
  OfflineQueued,
  /// The call never completed while online.
  #[error(transparent)]
  Transport(#[from] TransportError),
  /// The service answered with a non-2xx status.
  #[error("{endpoint} returned HTTP {status}")]
  Status { status: u16, endpoint: String },
  /// The request target could not be resolved against the base URL.
  #[error("invalid request target: {0}")]
  BadTarget(String),
}

/// Client over a pluggable [`Transport`].
pub struct ApiClient<T: Transport> {
  transport: T,
  store: Arc<Store>,
  base_url: Url,
  cache_ttl: chrono::Duration,
  retry: Option<RetryConfig>,
  online: AtomicBool,
  queue: tokio::sync::Mutex<ReplayQueue>,
  draining: AtomicBool,
}

impl<T: Transport> ApiClient<T> {
  pub fn new(config: &ClientConfig, transport: T, store: Arc<Store>) -> color_eyre::Result<Self> {
    let base_url = config.parse_base_url()?;

    Ok(Self {
      transport,
      store,
      base_url,
      cache_ttl: config.cache_ttl(),
      retry: config.retry,
      online: AtomicBool::new(true),
      queue: tokio::sync::Mutex::new(ReplayQueue::default()),
      draining: AtomicBool::new(false),
    })
  }

  pub(crate) fn store(&self) -> &Store {
    &self.store
  }

  #[cfg(test)]
  pub(crate) fn transport(&self) -> &T {
    &self.transport
  }

  pub(crate) fn cache_ttl(&self) -> chrono::Duration {
    self.cache_ttl
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Update the connectivity flag from a host-provided signal.
  /// Transitioning to online drains the replay queue before returning.
  pub async fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
    if online {
      self.drain_queue().await;
    }
  }

  /// Number of requests waiting for reconnect.
  pub async fn queued_len(&self) -> usize {
    self.queue.lock().await.len()
  }

  /// Issue a call. Bare paths are joined onto the configured base URL;
  /// absolute URLs pass through unchanged.
  pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
    let target = self.resolve(path)?;
    self.dispatch(target, options).await
  }

  pub(crate) fn resolve(&self, path: &str) -> Result<Url, ApiError> {
    if path.starts_with("http://") || path.starts_with("https://") {
      Url::parse(path).map_err(|e| ApiError::BadTarget(format!("{path}: {e}")))
    } else {
      self
        .base_url
        .join(path)
        .map_err(|e| ApiError::BadTarget(format!("{path}: {e}")))
    }
  }

  pub(crate) async fn dispatch(
    &self,
    target: Url,
    options: RequestOptions,
  ) -> Result<Value, ApiError> {
    match self.send_once(&target, &options).await {
      Ok(response) => Self::unpack(response, &target),
      Err(err) if !self.is_online() => {
        debug!(url = %target, error = %err, "offline, queueing request for replay");
        self.queue.lock().await.push(target, options);
        Err(ApiError::OfflineQueued)
      }
      Err(err) => Err(ApiError::Transport(err)),
    }
  }

  async fn send_once(
    &self,
    target: &Url,
    options: &RequestOptions,
  ) -> Result<TransportResponse, TransportError> {
    // Token is read fresh per attempt so a replay after re-login carries
    // the current credential
    let token = self.store.auth_token();
    match self.retry {
      Some(config) if self.is_online() => {
        retry_operation(
          || self.transport.send(target, options, token.as_deref()),
          config,
        )
        .await
      }
      _ => self.transport.send(target, options, token.as_deref()).await,
    }
  }

  fn unpack(response: TransportResponse, target: &Url) -> Result<Value, ApiError> {
    if (200..300).contains(&response.status) {
      Ok(response.body)
    } else {
      Err(ApiError::Status {
        status: response.status,
        endpoint: target.path().to_string(),
      })
    }
  }

  /// Replay queued requests strictly in enqueue order, one at a time.
  ///
  /// Each replay is awaited before the next starts so mutating endpoints
  /// observe the original request order. A replay that fails while online
  /// is dropped like any fresh failure; one whose transport call fails
  /// because connectivity dropped again mid-drain goes back to the head
  /// of the queue, so the next drain still sees the original order.
  async fn drain_queue(&self) {
    // Single-flight: a duplicate online signal must not start a second
    // drain alongside one already running
    if self.draining.swap(true, Ordering::SeqCst) {
      return;
    }

    loop {
      if !self.is_online() {
        break;
      }
      let next = self.queue.lock().await.pop();
      let Some(queued) = next else { break };

      debug!(url = %queued.target, "replaying queued request");
      self.replay(queued).await;
    }

    self.draining.store(false, Ordering::SeqCst);
  }

  async fn replay(&self, queued: QueuedRequest) {
    match self.send_once(&queued.target, &queued.options).await {
      Ok(response) => {
        if let Err(err) = Self::unpack(response, &queued.target) {
          debug!(error = %err, "queued request replay failed");
        }
      }
      Err(err) if !self.is_online() => {
        debug!(url = %queued.target, error = %err, "connection lost mid-drain, requeueing");
        self.queue.lock().await.requeue(queued);
      }
      Err(err) => {
        debug!(error = %err, "queued request replay failed");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Mutex;

  /// Scripted transport that records the order and overlap of calls.
  struct MockTransport {
    state: Mutex<MockState>,
  }

  struct MockState {
    reachable: bool,
    calls: Vec<String>,
    in_flight: bool,
    overlapped: bool,
    status: u16,
    fail_delay_ms: u64,
  }

  impl MockTransport {
    fn new() -> Self {
      Self {
        state: Mutex::new(MockState {
          reachable: true,
          calls: Vec::new(),
          in_flight: false,
          overlapped: false,
          status: 200,
          fail_delay_ms: 0,
        }),
      }
    }

    fn set_reachable(&self, reachable: bool) {
      self.state.lock().unwrap().reachable = reachable;
    }

    /// Make unreachable calls hang this long before failing, so a test
    /// can change state while a call is on the wire.
    fn set_fail_delay(&self, ms: u64) {
      self.state.lock().unwrap().fail_delay_ms = ms;
    }

    fn set_status(&self, status: u16) {
      self.state.lock().unwrap().status = status;
    }

    fn calls(&self) -> Vec<String> {
      self.state.lock().unwrap().calls.clone()
    }

    fn overlapped(&self) -> bool {
      self.state.lock().unwrap().overlapped
    }
  }

  impl Transport for MockTransport {
    async fn send(
      &self,
      target: &Url,
      _options: &RequestOptions,
      token: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
      let (status, fail_delay_ms) = {
        let mut state = self.state.lock().unwrap();
        if !state.reachable {
          (None, state.fail_delay_ms)
        } else {
          if state.in_flight {
            state.overlapped = true;
          }
          state.in_flight = true;
          state.calls.push(target.path().to_string());
          (Some(state.status), state.fail_delay_ms)
        }
      };

      let Some(status) = status else {
        tokio::time::sleep(std::time::Duration::from_millis(fail_delay_ms)).await;
        return Err(TransportError::Connect("unreachable".to_string()));
      };

      // Yield so a concurrent (incorrect) drain would interleave here
      tokio::time::sleep(std::time::Duration::from_millis(1)).await;

      let mut state = self.state.lock().unwrap();
      state.in_flight = false;
      Ok(TransportResponse {
        status,
        body: json!({"token_seen": token.is_some()}),
      })
    }
  }

  fn client(transport: MockTransport) -> ApiClient<MockTransport> {
    let store = Arc::new(Store::session().unwrap());
    ApiClient::new(&ClientConfig::default(), transport, store).unwrap()
  }

  #[tokio::test]
  async fn success_returns_parsed_body() {
    let client = client(MockTransport::new());
    let data = client.request("content/1", RequestOptions::get()).await;
    assert_eq!(data.unwrap()["token_seen"], json!(false));
  }

  #[tokio::test]
  async fn bearer_token_attached_when_stored() {
    let client = client(MockTransport::new());
    client.store.set_auth_token("tok");
    let data = client.request("content/1", RequestOptions::get()).await;
    assert_eq!(data.unwrap()["token_seen"], json!(true));
  }

  #[tokio::test]
  async fn non_2xx_maps_to_status_error() {
    let transport = MockTransport::new();
    transport.set_status(404);
    let client = client(transport);

    let err = client
      .request("content/missing", RequestOptions::get())
      .await
      .unwrap_err();
    match err {
      ApiError::Status { status, endpoint } => {
        assert_eq!(status, 404);
        assert_eq!(endpoint, "/v1/content/missing");
      }
      other => panic!("expected status error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn transport_failure_while_online_is_not_queued() {
    let transport = MockTransport::new();
    transport.set_reachable(false);
    let client = client(transport);

    let err = client
      .request("interactions", RequestOptions::post(json!({})))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(client.queued_len().await, 0);
  }

  #[tokio::test]
  async fn offline_failure_queues_and_replays_in_order() {
    let transport = MockTransport::new();
    transport.set_reachable(false);
    let client = client(transport);
    client.set_online(false).await;

    for path in ["interactions/a", "interactions/b", "interactions/c"] {
      let err = client
        .request(path, RequestOptions::post(json!({})))
        .await
        .unwrap_err();
      assert!(matches!(err, ApiError::OfflineQueued));
    }
    assert_eq!(client.queued_len().await, 3);

    client.transport.set_reachable(true);
    client.set_online(true).await;

    assert_eq!(
      client.transport.calls(),
      [
        "/v1/interactions/a",
        "/v1/interactions/b",
        "/v1/interactions/c"
      ]
    );
    assert!(!client.transport.overlapped(), "replays must be sequential");
    assert_eq!(client.queued_len().await, 0);
  }

  #[tokio::test]
  async fn failed_replay_is_not_requeued() {
    let transport = MockTransport::new();
    transport.set_reachable(false);
    let client = client(transport);
    client.set_online(false).await;

    let _ = client
      .request("interactions", RequestOptions::post(json!({})))
      .await;
    assert_eq!(client.queued_len().await, 1);

    // Back online, but the transport still fails: the replay surfaces the
    // failure and drops the entry
    client.set_online(true).await;
    assert_eq!(client.queued_len().await, 0);
  }

  #[tokio::test]
  async fn mid_drain_disconnect_keeps_replay_order() {
    let transport = MockTransport::new();
    transport.set_reachable(false);
    let client = client(transport);
    client.set_online(false).await;

    for path in ["interactions/a", "interactions/b"] {
      let _ = client.request(path, RequestOptions::post(json!({}))).await;
    }
    assert_eq!(client.queued_len().await, 2);

    // Reconnect, then lose the connection again while the first replay
    // is still on the wire
    client.transport.set_fail_delay(20);
    tokio::join!(client.set_online(true), async {
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
      client.set_online(false).await;
    });

    // The in-flight replay went back to the head, not the tail
    assert_eq!(client.queued_len().await, 2);

    client.transport.set_reachable(true);
    client.set_online(true).await;
    assert_eq!(
      client.transport.calls(),
      ["/v1/interactions/a", "/v1/interactions/b"]
    );
  }

  #[tokio::test]
  async fn duplicate_online_signals_replay_each_request_once() {
    let transport = MockTransport::new();
    transport.set_reachable(false);
    let client = client(transport);
    client.set_online(false).await;

    let _ = client.request("interactions/a", RequestOptions::get()).await;
    client.transport.set_reachable(true);

    // Concurrent duplicate signals: the drain guard lets only one through
    tokio::join!(client.set_online(true), client.set_online(true));

    assert_eq!(client.transport.calls(), ["/v1/interactions/a"]);
  }

  #[tokio::test]
  async fn bad_target_is_reported_not_queued() {
    let client = client(MockTransport::new());
    let err = client
      .request("https://", RequestOptions::get())
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::BadTarget(_)));
  }
}
