//! JSON-lines protocol over stdin/stdout. Every request gets exactly one
//! response line carrying the same id.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use error::bad_json;
pub use router::handle_request;
pub use types::{AppState, Request};
