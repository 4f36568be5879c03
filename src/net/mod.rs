//! Network boundary: the single path between the application and the
//! recommendation service.
//!
//! This module provides:
//! - A [`Transport`] seam over the wire, with a reqwest-backed production
//!   implementation
//! - [`ApiClient`], which attaches stored credentials, normalizes failures
//!   into [`ApiError`], and defers requests into a FIFO replay queue while
//!   the host reports the connection as down
//! - Domain operations (homepage, search, details, interactions, auth) as
//!   thin wrappers over the generic request path

mod api;
mod client;
mod queue;
mod transport;

pub use client::{ApiClient, ApiError};
pub use queue::{QueuedRequest, ReplayQueue};
pub use transport::{HttpTransport, RequestOptions, Transport, TransportError, TransportResponse};
