//! Error classification and reporting.
//!
//! Every failure the rest of the client cannot handle ends up here: it is
//! classified into a user-facing category, appended to a bounded diagnostic
//! log persisted through the store, and forwarded best-effort to the remote
//! collector. The rendering layer only ever sees the short category
//! message.

mod classify;
mod reporter;

pub use classify::ErrorKind;
pub use reporter::{ErrorRecord, ErrorReporter};
