//! Listener fan-out shared by the shipped transports.

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::{log_debug, Listener};

/// The set of listeners registered on one side of a channel.
///
/// Every delivered payload is cloned into every live listener. `Bytes`
/// clones are reference-counted, so fan-out does not copy payload data.
///
/// Inboxes are unbounded and the lock is only held to snapshot or edit the
/// set, never while sending.
pub(super) struct Fanout {
    // ---
    listeners: RwLock<Vec<mpsc::UnboundedSender<Bytes>>>,
}

impl Fanout {
    pub(super) fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(super) async fn subscribe(&self) -> Listener {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().await.push(tx);
        Listener { inbox: rx }
    }

    /// Deliver a payload to every listener, returning how many received it.
    pub(super) async fn deliver(&self, payload: Bytes) -> usize {
        // ---
        let snapshot: Vec<mpsc::UnboundedSender<Bytes>> = self.listeners.read().await.clone();

        let mut delivered = 0;
        let mut stale = false;

        for tx in &snapshot {
            // A closed inbox means the Listener was dropped.
            match tx.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => stale = true,
            }
        }

        if stale {
            let mut listeners = self.listeners.write().await;
            listeners.retain(|tx| !tx.is_closed());
            log_debug!("pruned dropped listeners, {} remaining", listeners.len());
        }

        delivered
    }

    /// Drop every listener; their inboxes drain and then yield `None`.
    pub(super) async fn clear(&self) {
        self.listeners.write().await.clear();
    }
}
