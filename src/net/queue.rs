//! In-memory FIFO queue of requests deferred while offline.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use url::Url;

use super::transport::RequestOptions;

/// A request captured while offline, awaiting replay after reconnect.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
  pub target: Url,
  pub options: RequestOptions,
  pub enqueued_at: DateTime<Utc>,
}

/// FIFO replay queue. Lives only in process memory: requests queued when
/// the process exits before reconnect are lost, which is the accepted
/// trade-off for mutating endpoints over undocumented persistence.
#[derive(Debug, Default)]
pub struct ReplayQueue {
  items: VecDeque<QueuedRequest>,
}

impl ReplayQueue {
  pub fn push(&mut self, target: Url, options: RequestOptions) {
    self.items.push_back(QueuedRequest {
      target,
      options,
      enqueued_at: Utc::now(),
    });
  }

  pub fn pop(&mut self) -> Option<QueuedRequest> {
    self.items.pop_front()
  }

  /// Put an in-flight replay back at the head of the queue, keeping its
  /// original position ahead of everything enqueued after it.
  pub fn requeue(&mut self, request: QueuedRequest) {
    self.items.push_front(request);
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pops_in_enqueue_order() {
    let mut queue = ReplayQueue::default();
    for path in ["a", "b", "c"] {
      let target = Url::parse(&format!("https://api.reelkit.io/v1/{path}")).unwrap();
      queue.push(target, RequestOptions::get());
    }

    assert_eq!(queue.len(), 3);
    let order: Vec<String> = std::iter::from_fn(|| queue.pop())
      .map(|q| q.target.path().to_string())
      .collect();
    assert_eq!(order, ["/v1/a", "/v1/b", "/v1/c"]);
    assert!(queue.is_empty());
  }

  #[test]
  fn requeue_restores_the_head() {
    let mut queue = ReplayQueue::default();
    for path in ["a", "b"] {
      let target = Url::parse(&format!("https://api.reelkit.io/v1/{path}")).unwrap();
      queue.push(target, RequestOptions::get());
    }

    let head = queue.pop().unwrap();
    queue.requeue(head);
    assert_eq!(queue.pop().unwrap().target.path(), "/v1/a");
    assert_eq!(queue.pop().unwrap().target.path(), "/v1/b");
  }
}
