//! Wire protocol for worker RPC messages.
//!
//! Requests and responses are JSON objects with their fields at the top
//! level of the posted payload:
//!
//! ```text
//! request:   { "id", "method", "args"? }
//! fulfilled: { "id", "method", "args"?, "status": "fulfilled", "value" }
//! rejected:  { "id", "method", "args"?, "status": "rejected",
//!              "reason": { "name", "message", "stack"?, "cause"? } }
//! ```
//!
//! No `data` wrapper is produced or accepted. These field names are the only
//! contract shared by clients and servers.
mod message;
mod reason;

pub use message::{Outcome, Request, Response};
pub use reason::{ErrorReason, UNKNOWN_ERROR_MESSAGE, UNKNOWN_ERROR_NAME};

pub(crate) use message::{decode_request, peek_id};
