//! Client resilience layer for the ReelKit recommendation service.
//!
//! This crate is the plumbing a ReelKit front end embeds to talk to the
//! recommendation API without falling over when the network does:
//!
//! - [`store::Store`]: durable, prefix-scoped key-value storage with
//!   per-entry expiration, holding auth tokens, user preferences, cached
//!   responses and the diagnostic error log
//! - [`retry::retry_operation`]: exponential-backoff retry for any async
//!   operation
//! - [`net::ApiClient`]: the single network boundary, with bearer
//!   authentication, a normalized failure envelope, and a FIFO replay
//!   queue for requests attempted while offline
//! - [`report::ErrorReporter`]: bounded diagnostic logging, best-effort
//!   remote reporting, and short user-facing failure messages
//!
//! Services are constructed once at startup and passed by reference; there
//! are no module-level singletons, so tests substitute fakes freely:
//!
//! ```no_run
//! use std::sync::Arc;
//! use reelkit::{ApiClient, ClientConfig, ErrorReporter, HttpTransport, Store};
//!
//! # fn main() -> color_eyre::Result<()> {
//! let config = ClientConfig::default();
//! let store = Arc::new(Store::open()?);
//! let transport = HttpTransport::new(&config.user_agent, config.request_timeout())?;
//! let client = ApiClient::new(&config, transport, Arc::clone(&store))?;
//! let reporter = Arc::new(ErrorReporter::new(&config, store)?);
//! Arc::clone(&reporter).install_panic_hook();
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod net;
pub mod report;
pub mod retry;
pub mod store;

pub use config::ClientConfig;
pub use net::{ApiClient, ApiError, HttpTransport, RequestOptions, Transport};
pub use report::{ErrorKind, ErrorRecord, ErrorReporter};
pub use retry::{retry_operation, RetryConfig};
pub use store::Store;
