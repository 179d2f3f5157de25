// src/client/mod.rs
//! Client correlator.
//!
//! This module contains [`WorkerClient`], which turns method calls into
//! request messages on a channel and resolves each call when the matching
//! response comes back.
//!
//! # Architecture
//!
//! Setup registers one listener on the channel and runs a background receive
//! loop over it. Each call generates a correlation id, records a pending
//! entry (a oneshot sender plus a timer task), and posts the request. The
//! receive loop matches incoming responses against the pending table by id
//! and settles the waiting call; the timer fails the call if nothing arrives
//! in time. Payloads that match no pending call are ignored, since the
//! channel may carry unrelated traffic.
//!
//! # Concurrency
//!
//! Any number of calls can be in flight at once, from any number of tasks.
//! Responses may arrive in any order.
mod method;
mod pending;

pub use method::RemoteMethod;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::protocol::{peek_id, Outcome, Request, Response};
use crate::{
    // ---
    log_debug,
    log_warn,
    ChannelPtr,
    ClientConfig,
    CorrelationId,
    Error,
    IdGenerator,
    Listener,
    RemoteError,
    Result,
};
use pending::PendingCalls;

/// Running client bound to one channel.
///
/// Cheap to clone (internally `Arc`-backed). Dropping the last clone stops
/// the receive loop and fails outstanding calls with [`Error::Shutdown`].
#[derive(Clone)]
pub struct WorkerClient {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    channel: ChannelPtr,
    pending: Arc<PendingCalls>,
    timeout: Duration,
    id_generator: IdGenerator,
    methods: Option<Vec<Arc<str>>>,
    stopped: AtomicBool,
    rx_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        self.rx_task.abort();
        self.pending.fail_all();
    }
}

impl WorkerClient {
    // ---
    /// Bind a client to `channel`.
    ///
    /// The response listener is registered before this returns.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configured method list is invalid
    /// - `Error::ChannelClosed` / `Error::Transport` if subscribing fails
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use serde_json::json;
    /// use worker_rpc::{transport, ClientConfig, OperationRegistry, ServerConfig};
    /// use worker_rpc::{WorkerClient, WorkerServer};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> worker_rpc::Result<()> {
    /// let (worker_side, caller_side) = transport::memory_pair();
    ///
    /// let mut ops = OperationRegistry::new();
    /// ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) });
    /// let _server = WorkerServer::setup(ops, ServerConfig::new(worker_side)).await?;
    ///
    /// let config = ClientConfig::new().with_timeout(Duration::from_secs(5));
    /// let client = WorkerClient::setup(caller_side, config).await?;
    ///
    /// let sum = client.call("add", vec![json!(2), json!(3)]).await?;
    /// assert_eq!(sum, json!(5));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn setup(channel: ChannelPtr, config: ClientConfig) -> Result<Self> {
        // ---
        config.validate()?;

        let listener = channel.subscribe().await?;
        let pending = PendingCalls::new();

        let rx_task = tokio::spawn(receive_loop(listener, pending.clone()));

        let methods = config
            .methods
            .map(|names| names.into_iter().map(Arc::from).collect());

        Ok(Self {
            inner: Arc::new(Inner {
                channel,
                pending,
                timeout: config.timeout,
                id_generator: config.id_generator,
                methods,
                stopped: AtomicBool::new(false),
                rx_task,
            }),
        })
    }

    /// Call a remote method with positional arguments.
    ///
    /// Resolves with the remote return value, or fails with:
    /// - `Error::Remote` if the operation failed on the other side
    /// - `Error::Timeout` if no response arrived within the timeout
    /// - `Error::UnknownMethod` if `method` is outside the configured list
    /// - `Error::DuplicateCallId` if the generated id is still outstanding
    /// - `Error::ChannelClosed` / `Error::Transport` if posting failed
    /// - `Error::Shutdown` if the client was shut down
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        // ---
        self.check_method(method)?;

        let id = CorrelationId::from((self.inner.id_generator)(method, &args));
        if id.is_empty() {
            return Err(Error::Config("id generator returned an empty id".into()));
        }

        let payload = Request::new(id.clone(), method, args).encode()?;
        if self.is_stopped() {
            return Err(Error::Shutdown);
        }

        let rx = self.inner.pending.register(id.clone(), self.inner.timeout)?;

        // Registered after shutdown drained the table: nothing will settle it.
        if self.is_stopped() {
            self.inner.pending.cancel(&id);
            return Err(Error::Shutdown);
        }

        if let Err(err) = self.inner.channel.post(payload).await {
            self.inner.pending.cancel(&id);
            return Err(err);
        }

        log_debug!("posted call {id} to '{method}'");

        // The sender only disappears without a value if the table was torn
        // down, which happens on shutdown.
        rx.await.unwrap_or(Err(Error::Shutdown))
    }

    /// Typed variant of [`call`](Self::call).
    ///
    /// `args` should serialize to a JSON array of positional arguments (a
    /// tuple such as `(2, 3)`); `()` means no arguments and any other value
    /// is sent as the single argument. The result is deserialized into `R`.
    pub async fn request<A, R>(&self, method: &str, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        // ---
        let value = self.call(method, to_args(args)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// A callable handle for one remote method.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMethod` if `name` is empty or outside the
    /// configured method list.
    pub fn method(&self, name: &str) -> Result<RemoteMethod> {
        // ---
        self.check_method(name)?;
        Ok(RemoteMethod::new(self.clone(), Arc::from(name)))
    }

    /// One handle per configured method; empty if no list was configured.
    pub fn methods(&self) -> Vec<RemoteMethod> {
        // ---
        self.inner
            .methods
            .iter()
            .flatten()
            .map(|name| RemoteMethod::new(self.clone(), name.clone()))
            .collect()
    }

    /// The underlying channel, unmodified.
    pub fn channel(&self) -> &ChannelPtr {
        &self.inner.channel
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Stop listening and fail every pending call with `Error::Shutdown`.
    ///
    /// Calls made afterwards fail with `Error::Shutdown` without posting.
    pub fn shutdown(&self) {
        // ---
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.rx_task.abort();
        let _failed = self.inner.pending.fail_all();
        log_debug!("worker client shut down, {_failed} pending call(s) failed");
    }

    fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    fn check_method(&self, name: &str) -> Result<()> {
        // ---
        let allowed = match &self.inner.methods {
            _ if name.is_empty() => false,
            Some(methods) => methods.iter().any(|m| &**m == name),
            None => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::UnknownMethod(name.to_owned()))
        }
    }
}

/// Serialize typed arguments into a positional argument list.
fn to_args<A: Serialize>(args: A) -> Result<Vec<Value>> {
    // ---
    Ok(match serde_json::to_value(args)? {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}

async fn receive_loop(mut listener: Listener, pending: Arc<PendingCalls>) {
    // ---
    while let Some(payload) = listener.inbox.recv().await {
        handle_payload(&pending, &payload);
    }

    log_debug!("client listener stopped: channel closed");
}

/// Settle the pending call a payload answers, if any.
fn handle_payload(pending: &PendingCalls, payload: &[u8]) {
    // ---
    let response = match Response::decode(payload) {
        Ok(response) => response,
        Err(_err) => {
            match peek_id(payload) {
                Some(id) if pending.contains(&id) => {
                    log_warn!("ignoring malformed message for pending call {id}: {_err}");
                }
                _ => {
                    log_debug!("ignoring payload that is not a response");
                }
            }
            return;
        }
    };

    let outcome = match response.outcome {
        Outcome::Fulfilled { value } => Ok(value),
        Outcome::Rejected { reason } => Err(Error::Remote(RemoteError::from(reason))),
    };

    if !pending.settle(&response.id, outcome) {
        log_debug!("ignoring response for unknown or settled call {}", response.id);
    }
}
