//! Exponential-backoff retry for async operations.
//!
//! The policy is content-agnostic: it knows nothing about HTTP or any
//! particular error type, so any fallible async operation can be wrapped.
//! Callers opt in per call site, or wire a [`RetryConfig`] into the API
//! client to retry every online request.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Total number of attempts (initial attempt included)
  pub max_retries: u32,
  /// Delay before the second attempt, in milliseconds; doubles per attempt
  pub base_delay_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay_ms: 1000,
    }
  }
}

impl RetryConfig {
  pub fn base_delay(&self) -> Duration {
    Duration::from_millis(self.base_delay_ms)
  }
}

/// Run `operation` up to `config.max_retries` times, waiting
/// `base_delay * 2^i` after failed attempt `i` (0-indexed).
///
/// Returns the first success immediately. When every attempt fails, the
/// error from the final attempt is returned unchanged.
pub async fn retry_operation<T, E, F, Fut>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let attempts = config.max_retries.max(1);
  let mut attempt = 0u32;

  loop {
    match operation().await {
      Ok(value) => return Ok(value),
      Err(err) => {
        attempt += 1;
        if attempt >= attempts {
          return Err(err);
        }
        sleep(config.base_delay() * 2u32.pow(attempt - 1)).await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use tokio::time::Instant;

  #[tokio::test]
  async fn first_success_returns_immediately() {
    let calls = AtomicU32::new(0);
    let result = retry_operation(
      || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, String>(42) }
      },
      RetryConfig::default(),
    )
    .await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn backoff_doubles_between_attempts() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();
    let result = retry_operation(
      || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
          if n < 3 {
            Err(format!("attempt {n} failed"))
          } else {
            Ok(n)
          }
        }
      },
      RetryConfig {
        max_retries: 3,
        base_delay_ms: 1000,
      },
    )
    .await;

    assert_eq!(result, Ok(3));
    // 1000ms before attempt 2, 2000ms before attempt 3
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(3500));
  }

  #[tokio::test(start_paused = true)]
  async fn exhaustion_returns_last_error() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_operation(
      || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Err(format!("attempt {n} failed")) }
      },
      RetryConfig {
        max_retries: 3,
        base_delay_ms: 100,
      },
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result, Err("attempt 3 failed".to_string()));
  }
}
