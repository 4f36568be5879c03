//! Fault classification into a small set of user-facing categories.
//!
//! Typed faults ([`ApiError`]) classify by discriminant. Faults that reach
//! us as opaque text (panic payloads, third-party errors) fall back to an
//! ordered substring scan; the first matching rule wins.

use crate::net::{ApiError, TransportError};

/// User-facing failure category. Raw detail stays in the diagnostic log;
/// the category's message is all an end user ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Network,
  Timeout,
  BadRequest,
  Unauthorized,
  Forbidden,
  NotFound,
  RateLimited,
  Server,
  Storage,
  Unknown,
}

impl ErrorKind {
  /// The short, stable message shown to the user.
  pub fn user_message(self) -> &'static str {
    match self {
      Self::Network => "Network error. Please check your connection.",
      Self::Timeout => "The request took too long. Please try again.",
      Self::BadRequest => "Invalid request. Please check your input.",
      Self::Unauthorized => "Your session has expired. Please log in again.",
      Self::Forbidden => "You don't have access to this content.",
      Self::NotFound => "The requested content was not found.",
      Self::RateLimited => "Too many requests. Please wait a moment.",
      Self::Server => "Something went wrong on our end. Please try again later.",
      Self::Storage => "Local storage is unavailable.",
      Self::Unknown => "Something went wrong. Please try again.",
    }
  }

  /// Fixed mapping from HTTP status to category.
  pub fn from_status(status: u16) -> Self {
    match status {
      400 => Self::BadRequest,
      401 => Self::Unauthorized,
      403 => Self::Forbidden,
      404 => Self::NotFound,
      429 => Self::RateLimited,
      500 => Self::Server,
      _ => Self::Unknown,
    }
  }

  /// Ordered substring rules for opaque error text; first match wins.
  pub fn from_message(message: &str) -> Self {
    const RULES: &[(&str, ErrorKind)] = &[
      ("timed out", ErrorKind::Timeout),
      ("timeout", ErrorKind::Timeout),
      ("offline", ErrorKind::Network),
      ("network", ErrorKind::Network),
      ("connection", ErrorKind::Network),
      ("unauthorized", ErrorKind::Unauthorized),
      ("forbidden", ErrorKind::Forbidden),
      ("not found", ErrorKind::NotFound),
      ("too many requests", ErrorKind::RateLimited),
      ("quota", ErrorKind::Storage),
      ("storage", ErrorKind::Storage),
      ("database", ErrorKind::Storage),
    ];

    let lower = message.to_lowercase();
    RULES
      .iter()
      .find(|(pattern, _)| lower.contains(pattern))
      .map(|(_, kind)| *kind)
      .unwrap_or(Self::Unknown)
  }
}

impl From<&ApiError> for ErrorKind {
  fn from(error: &ApiError) -> Self {
    match error {
      ApiError::OfflineQueued => Self::Network,
      ApiError::Transport(TransportError::Timeout) => Self::Timeout,
      ApiError::Transport(_) => Self::Network,
      ApiError::Status { status, .. } => Self::from_status(*status),
      ApiError::BadTarget(_) => Self::Unknown,
    }
  }
}
