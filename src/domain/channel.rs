// src/domain/channel.rs

//! Channel domain abstraction.
//!
//! A channel is the minimal surface a transport must provide to carry worker
//! RPC traffic: post an outbound payload, and register a listener that
//! receives inbound payloads. It has no notion of calls or responses; the
//! client and server layers build correlation on top of it.
//!
//! Payloads are opaque bytes. The protocol layer encodes every message as
//! JSON before posting, so nothing but serialized data crosses the channel.
//!
//! Concrete implementations live under `src/transport/`.
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// Handle returned from a successful subscription.
///
/// The listener stays registered until either the handle is dropped or the
/// channel is closed, at which point `inbox.recv()` returns `None`.
///
/// # Example
///
/// ```
/// # use worker_rpc::transport::memory_pair;
/// # use bytes::Bytes;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> worker_rpc::Result<()> {
/// let (left, right) = memory_pair();
///
/// let mut listener = right.subscribe().await?;
/// left.post(Bytes::from_static(b"{}")).await?;
///
/// let payload = listener.inbox.recv().await;
/// assert_eq!(payload.as_deref(), Some(&b"{}"[..]));
/// # Ok(())
/// # }
/// ```
pub struct Listener {
    // ---
    /// Receiver for every payload delivered to this side of the channel.
    ///
    /// Unbounded: a listener that stops reading only grows its own backlog
    /// and never holds up posts or other listeners.
    pub inbox: mpsc::UnboundedReceiver<Bytes>,
}

/// Bidirectional, fire-and-forget message channel.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns, payloads arriving afterwards are delivered
///   to the new listener.
/// - Every registered listener sees every inbound payload, so one channel
///   can be shared by a client, a server and unrelated traffic.
/// - `post()` does not wait for the remote side to process the payload, nor
///   for any listener to drain its inbox.
///
/// No ordering, durability or flow-control guarantees are required.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    // ---
    /// Post a payload to the other side of the channel.
    async fn post(&self, payload: Bytes) -> Result<()>;

    /// Register a listener for payloads arriving on this side.
    async fn subscribe(&self) -> Result<Listener>;

    /// Close the channel and drop all listeners.
    async fn close(&self) -> Result<()>;
}

/// Shared channel pointer.
///
/// `.clone()` only bumps a reference count; clones share one channel.
pub type ChannelPtr = Arc<dyn Channel>;
