//! Adapter from a raw queue pair to the listener-style `Channel`.
//!
//! Many message sources hand out a single receiver (the inbound half of a
//! worker thread's queue, a pipe reader task, ...) rather than a listener
//! registry. `stream_channel` turns such a `(Sender, Receiver)` pair into a
//! `Channel` by pumping the receiver into every subscribed listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

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

struct StreamChannel {
    // ---
    outbound: mpsc::Sender<Bytes>,
    inbound: Arc<Fanout>,
    closed: Arc<AtomicBool>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait::async_trait]
impl Channel for StreamChannel {
    // ---
    async fn post(&self, payload: Bytes) -> Result<()> {
        // ---
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ChannelClosed);
        }

        self.outbound
            .send(payload)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    async fn subscribe(&self) -> Result<Listener> {
        // ---
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ChannelClosed);
        }
        Ok(self.inbound.subscribe().await)
    }

    async fn close(&self) -> Result<()> {
        // ---
        self.closed.store(true, Ordering::Release);

        let pump = match self.pump.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(pump) = pump {
            pump.abort();
        }

        self.inbound.clear().await;
        Ok(())
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        // ---
        let pump = match self.pump.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(pump) = pump {
            pump.abort();
        }
    }
}

/// Adapt a sender/receiver pair into a [`Channel`].
///
/// Posts go to `outbound`. Everything received on `inbound` is delivered to
/// every listener. When `inbound` ends, all listeners see their inbox end and
/// further posts fail once the peer has dropped its receiver.
///
/// Must be called from within a Tokio runtime; the pump runs as a task.
pub fn stream_channel(outbound: mpsc::Sender<Bytes>, mut inbound: mpsc::Receiver<Bytes>) -> ChannelPtr {
    // ---
    let fanout = Arc::new(Fanout::new());
    let closed = Arc::new(AtomicBool::new(false));

    let pump = {
        let fanout = fanout.clone();
        let closed = closed.clone();

        tokio::spawn(async move {
            // ---
            while let Some(payload) = inbound.recv().await {
                fanout.deliver(payload).await;
            }

            log_debug!("stream channel: inbound ended");
            closed.store(true, Ordering::Release);
            fanout.clear().await;
        })
    };

    Arc::new(StreamChannel {
        outbound,
        inbound: fanout,
        closed,
        pump: Mutex::new(Some(pump)),
    })
}
