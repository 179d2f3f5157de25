// src/server/mod.rs
//! Server dispatcher.
//!
//! A [`WorkerServer`] binds a fixed set of operations to a channel. For each
//! inbound request naming a registered method it invokes the operation with
//! the request's positional arguments and posts back exactly one response.
//! Everything else arriving on the channel is ignored without a reply, so
//! the channel can be shared with unrelated traffic and method probing gets
//! no signal.
//!
//! # Concurrency
//!
//! Every request runs on its own task; slow operations do not hold up
//! others, and responses may be posted in any order. The registry is frozen
//! at setup and shared read-only by all dispatches.
mod failure;
mod registry;
mod source;

pub use failure::OperationError;
pub use registry::{Operation, OperationRegistry, OperationResult};
pub use source::{OperationSource, Operations};

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::protocol::{decode_request, ErrorReason, Response};
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    ChannelPtr,
    Error,
    Listener,
    Result,
    ServerConfig,
};

/// Running dispatcher bound to one channel.
///
/// Cheap to clone (internally `Arc`-backed).
///
/// # Example
///
/// ```
/// use worker_rpc::{transport, OperationRegistry, ServerConfig, WorkerServer};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> worker_rpc::Result<()> {
/// let (worker_side, _caller_side) = transport::memory_pair();
///
/// let mut ops = OperationRegistry::new();
/// ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) });
///
/// let server = WorkerServer::setup(ops, ServerConfig::new(worker_side)).await?;
/// assert_eq!(server.methods(), vec!["add"]);
/// # server.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkerServer {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    target: ChannelPtr,
    registry: Arc<OperationRegistry>,
    stopped: watch::Receiver<bool>,
    rx_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.rx_task.abort();
    }
}

impl WorkerServer {
    // ---
    /// Resolve the operation source and start answering requests.
    ///
    /// The listener is registered before this returns, so requests posted
    /// afterwards are never missed. Dropping the last handle to the server
    /// stops the dispatcher.
    ///
    /// # Errors
    ///
    /// - `Error::MissingConfig` if `config.target` is not set
    /// - `Error::ChannelClosed` / `Error::Transport` if subscribing fails
    pub async fn setup(source: impl Into<OperationSource>, config: ServerConfig) -> Result<Self> {
        // ---
        let target = config
            .target
            .ok_or_else(|| Error::MissingConfig("target".into()))?;

        let registry = Arc::new(source.into().resolve());
        if registry.is_empty() {
            log_warn!("worker server has no operations; every request will be ignored");
        } else {
            log_info!("worker server serving: {}", registry.names().join(", "));
        }

        let listener = target.subscribe().await?;
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let rx_task = tokio::spawn(receive_loop(
            target.clone(),
            registry.clone(),
            listener,
            stopped_tx,
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                target,
                registry,
                stopped: stopped_rx,
                rx_task,
            }),
        })
    }

    /// The channel this server is bound to.
    pub fn target(&self) -> &ChannelPtr {
        &self.inner.target
    }

    /// Names of the served operations, sorted.
    pub fn methods(&self) -> Vec<&str> {
        self.inner.registry.names()
    }

    /// Wait until the receive loop ends (channel closed or shutdown).
    pub async fn run(&self) -> Result<()> {
        // ---
        let mut stopped = self.inner.stopped.clone();
        while !*stopped.borrow_and_update() {
            if stopped.changed().await.is_err() {
                // Sender dropped: the loop was aborted.
                break;
            }
        }
        Ok(())
    }

    /// Stop accepting requests.
    ///
    /// Dispatches already in flight still post their responses.
    pub fn shutdown(&self) {
        log_debug!("worker server shutting down");
        self.inner.rx_task.abort();
    }
}

async fn receive_loop(
    target: ChannelPtr,
    registry: Arc<OperationRegistry>,
    mut listener: Listener,
    stopped: watch::Sender<bool>,
) {
    // ---
    log_debug!("dispatcher started with {} operation(s)", registry.len());

    while let Some(payload) = listener.inbox.recv().await {
        dispatch(&target, &registry, payload);
    }

    log_debug!("dispatcher stopped: channel closed");
    let _ = stopped.send(true);
}

/// Validate one inbound payload and, if it is a request for a registered
/// method, answer it on a new task.
fn dispatch(target: &ChannelPtr, registry: &OperationRegistry, payload: Bytes) {
    // ---
    let request = match decode_request(&payload) {
        Some(request) => request,
        None => {
            log_debug!("ignoring payload that is not a request");
            return;
        }
    };

    let operation = match registry.get(&request.method) {
        Some(operation) => operation,
        None => {
            log_debug!("ignoring request for unregistered method '{}'", request.method);
            return;
        }
    };

    let target = target.clone();

    tokio::spawn(async move {
        // ---
        let args = request.args_or_empty();

        // Run on a nested task so a panicking operation is contained.
        let outcome = tokio::spawn(async move { operation.call(args).await }).await;

        let response = match outcome {
            Ok(Ok(value)) => request.fulfill(value),
            Ok(Err(failure)) => {
                log_debug!("operation '{}' failed: {failure}", request.method);
                request.reject(failure.into_reason())
            }
            Err(_join_err) => {
                log_warn!("operation '{}' aborted: {_join_err}", request.method);
                request.reject(ErrorReason::unknown())
            }
        };

        post_response(&target, response).await;
    });
}

async fn post_response(target: &ChannelPtr, response: Response) {
    // ---
    let payload = match response.encode() {
        Ok(payload) => payload,
        Err(err) => {
            log_error!("failed to encode response {}: {err}", response.id);
            return;
        }
    };

    if let Err(err) = target.post(payload).await {
        log_error!("failed to post response {}: {err}", response.id);
    }
}
