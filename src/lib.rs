//! Promise-style RPC over fire-and-forget worker message channels.
//!
//! A worker boundary (a thread, a task, another process) usually offers only
//! a message channel: post a payload, receive payloads through a listener.
//! This crate layers calls on top of that. A [`WorkerServer`] exposes a fixed
//! set of named operations on a channel; a [`WorkerClient`] on the other end
//! calls them and gets back a future that resolves with the result, fails
//! with the remote error, or times out.
//!
//! Correlation happens entirely in-band through the `id` field of the wire
//! messages described in [`protocol`]; client and server share nothing else.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use worker_rpc::{setup_client, setup_server, transport};
//! use worker_rpc::{ClientConfig, OperationError, OperationRegistry, ServerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> worker_rpc::Result<()> {
//! let (worker_side, caller_side) = transport::memory_pair();
//!
//! let mut ops = OperationRegistry::new();
//! ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) })
//!     .register_typed("fail", |()| async move {
//!         Err::<(), _>(OperationError::error("boom"))
//!     });
//! let _server = setup_server(ops, ServerConfig::new(worker_side)).await?;
//!
//! let client = setup_client(caller_side, ClientConfig::new()).await?;
//!
//! let sum: i64 = client.request("add", (2, 3)).await?;
//! assert_eq!(sum, 5);
//!
//! let err = client.call("fail", vec![]).await.unwrap_err();
//! assert_eq!(err.to_string(), "Error: boom");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `logging`: emit diagnostics through `tracing`. Without it only errors
//!   are printed, to stderr.

// Import all sub modules once...
mod macros;

mod client;
mod config;
mod correlation;
mod domain;
mod error;
mod server;

pub mod protocol;
pub mod transport;

#[allow(unused_imports)]
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{RemoteMethod, WorkerClient};
pub use server::{
    //
    Operation,
    OperationError,
    OperationRegistry,
    OperationResult,
    OperationSource,
    Operations,
    WorkerServer,
};

pub use config::{ClientConfig, ServerConfig, DEFAULT_TIMEOUT};

pub use correlation::{default_id_generator, CorrelationId, IdGenerator};
pub use error::{Error, RemoteError, Result};

// --- public re-exports
pub use domain::{
    //
    Channel,
    ChannelPtr,
    Listener,
};

/// Bind a client to `channel`. Same as [`WorkerClient::setup`].
pub async fn setup_client(channel: ChannelPtr, config: ClientConfig) -> Result<WorkerClient> {
    WorkerClient::setup(channel, config).await
}

/// Serve `operations` on `config.target`. Same as [`WorkerServer::setup`].
pub async fn setup_server(
    operations: impl Into<OperationSource>,
    config: ServerConfig,
) -> Result<WorkerServer> {
    WorkerServer::setup(operations, config).await
}
