//! HTTP transport seam for the API client.
//!
//! The client is generic over [`Transport`] so tests can substitute a
//! scripted fake; [`HttpTransport`] is the reqwest-backed implementation
//! used in production.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Method and body for one outgoing request. Headers beyond content type
/// and authorization are not part of the client's contract.
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub body: Option<Value>,
}

impl RequestOptions {
  pub fn get() -> Self {
    Self {
      method: Method::GET,
      body: None,
    }
  }

  pub fn post(body: Value) -> Self {
    Self {
      method: Method::POST,
      body: Some(body),
    }
  }
}

/// Raw outcome of a completed HTTP exchange. Status interpretation is the
/// client's job; the transport only distinguishes "an answer arrived" from
/// "the call never completed".
#[derive(Debug, Clone)]
pub struct TransportResponse {
  pub status: u16,
  pub body: Value,
}

/// A network call that could not complete. Distinct from an HTTP error
/// status, which is a completed call.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,
  #[error("connection failed: {0}")]
  Connect(String),
  #[error("transport failure: {0}")]
  Other(String),
}

/// The single seam between the API client and the wire.
pub trait Transport: Send + Sync {
  fn send(
    &self,
    target: &Url,
    options: &RequestOptions,
    token: Option<&str>,
  ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Production transport over a pooled reqwest client.
pub struct HttpTransport {
  http: reqwest::Client,
}

impl HttpTransport {
  pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(user_agent)
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;
    Ok(Self { http })
  }
}

impl Transport for HttpTransport {
  async fn send(
    &self,
    target: &Url,
    options: &RequestOptions,
    token: Option<&str>,
  ) -> Result<TransportResponse, TransportError> {
    let mut request = self
      .http
      .request(options.method.clone(), target.clone())
      .header(CONTENT_TYPE, "application/json");

    if let Some(token) = token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = &options.body {
      request = request.json(body);
    }

    let response = request.send().await.map_err(|e| {
      if e.is_timeout() {
        TransportError::Timeout
      } else if e.is_connect() {
        TransportError::Connect(e.to_string())
      } else {
        TransportError::Other(e.to_string())
      }
    })?;

    let status = response.status().as_u16();
    let text = response
      .text()
      .await
      .map_err(|e| TransportError::Other(e.to_string()))?;

    // Error pages are not always JSON; keep the raw text so status
    // classification still sees a completed call
    let body = if text.is_empty() {
      Value::Null
    } else {
      serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    Ok(TransportResponse { status, body })
  }
}
