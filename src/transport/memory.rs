//! In-memory channel implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Channel` trait: two connected ports, like the two ends of a worker's
//! message channel. A payload posted on one port is delivered to every
//! listener registered on the other.
//!
//! ## Reference Semantics
//!
//! The in-memory pair defines the reference behavior for channels:
//!
//! - Once `subscribe()` returns successfully, payloads posted by the peer
//!   after that point are deliverable to the new listener.
//! - Delivery is deterministic within a single process.
//! - Payloads posted while the peer has no listeners are dropped.
//!
//! ## Non-Goals
//!
//! This transport does not emulate serialization costs, reordering, or the
//! failure modes of a real thread or process boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use super::fanout::Fanout;
use crate::{
    // ---
    log_debug,
    Channel,
    ChannelPtr,
    Error,
    Listener,
    Result,
};

/// State shared by both ports of a pair.
struct Shared {
    // ---
    sides: [Fanout; 2],
    closed: AtomicBool,
}

/// One end of an in-memory pair.
struct MemoryPort {
    // ---
    shared: Arc<Shared>,
    side: usize,
}

impl MemoryPort {
    fn local(&self) -> &Fanout {
        &self.shared.sides[self.side]
    }

    fn remote(&self) -> &Fanout {
        &self.shared.sides[1 - self.side]
    }

    fn ensure_open(&self) -> Result<()> {
        // ---
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::ChannelClosed);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Channel for MemoryPort {
    // ---

    /// Deliver the payload to every listener on the peer port.
    async fn post(&self, payload: Bytes) -> Result<()> {
        // ---
        self.ensure_open()?;

        let _delivered = self.remote().deliver(payload).await;
        log_debug!("port {}: posted to {_delivered} listener(s)", self.side);

        Ok(())
    }

    /// Register a listener on this port.
    async fn subscribe(&self) -> Result<Listener> {
        // ---
        self.ensure_open()?;

        log_debug!("port {}: subscribe", self.side);
        Ok(self.local().subscribe().await)
    }

    /// Close the pair.
    ///
    /// Closing either port closes both: all listeners on both sides see their
    /// inbox end, and further posts fail with [`Error::ChannelClosed`].
    async fn close(&self) -> Result<()> {
        // ---
        log_debug!("port {}: closing channel pair", self.side);

        self.shared.closed.store(true, Ordering::Release);
        for side in &self.shared.sides {
            side.clear().await;
        }
        Ok(())
    }
}

/// Create two connected in-memory ports.
///
/// Typically one port is handed to a [`WorkerServer`](crate::WorkerServer)
/// and the other to a [`WorkerClient`](crate::WorkerClient).
///
/// # Example
///
/// ```
/// # use worker_rpc::transport::memory_pair;
/// let (worker_side, caller_side) = memory_pair();
/// # drop((worker_side, caller_side));
/// ```
pub fn memory_pair() -> (ChannelPtr, ChannelPtr) {
    // ---
    let shared = Arc::new(Shared {
        sides: [Fanout::new(), Fanout::new()],
        closed: AtomicBool::new(false),
    });

    let left = MemoryPort {
        shared: shared.clone(),
        side: 0,
    };
    let right = MemoryPort { shared, side: 1 };

    (Arc::new(left), Arc::new(right))
}
