use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{log_debug, CorrelationId, Error, Result};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The table has no invariants spanning entries; the worst outcome of a
/// poisoned lock is one call settling late or timing out.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One outstanding call.
struct PendingCall {
    // ---
    settle: oneshot::Sender<Result<Value>>,
    timer: JoinHandle<()>,
}

/// Tracks calls waiting for a response.
///
/// Maps correlation ids to the sender that settles the caller's future and
/// the timer that expires it. An entry leaves the table exactly once: on
/// settlement, on expiry, on cancellation, or on shutdown. Whichever comes
/// first wins and the others find nothing to do.
///
/// The lock is never held across an `.await`.
pub(super) struct PendingCalls {
    // ---
    calls: Mutex<HashMap<CorrelationId, PendingCall>>,
}

impl PendingCalls {
    // ---

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Register a call and start its timer.
    ///
    /// Returns the receiver the caller awaits. Fails if `id` is already
    /// outstanding; the existing call is left untouched.
    pub fn register(
        self: &Arc<Self>,
        id: CorrelationId,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Result<Value>>> {
        // ---
        let mut calls = lock_ignore_poison(&self.calls);

        if calls.contains_key(&id) {
            return Err(Error::DuplicateCallId(id.to_string()));
        }

        let (settle, rx) = oneshot::channel();

        // Spawned under the lock: the timer cannot observe the table before
        // the entry exists, even with a zero timeout.
        let timer = {
            let table: Weak<Self> = Arc::downgrade(self);
            let id = id.clone();
            tokio::spawn(async move {
                time::sleep(timeout).await;
                if let Some(table) = table.upgrade() {
                    table.expire(&id);
                }
            })
        };

        calls.insert(id, PendingCall { settle, timer });
        Ok(rx)
    }

    /// Settle a call with its outcome.
    ///
    /// Returns false if the id is unknown or already settled.
    pub fn settle(&self, id: &CorrelationId, outcome: Result<Value>) -> bool {
        // ---
        let call = lock_ignore_poison(&self.calls).remove(id);

        match call {
            Some(call) => {
                call.timer.abort();
                if call.settle.send(outcome).is_err() {
                    log_debug!("caller for {id} went away before settlement");
                }
                true
            }
            None => false,
        }
    }

    /// Fail a call with `Error::Timeout`. Called by its timer.
    fn expire(&self, id: &CorrelationId) -> bool {
        // ---
        let call = lock_ignore_poison(&self.calls).remove(id);

        match call {
            Some(call) => {
                log_debug!("call {id} timed out");
                let _ = call.settle.send(Err(Error::Timeout));
                true
            }
            None => false,
        }
    }

    /// Drop a call without settling it (its request was never posted).
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        // ---
        match lock_ignore_poison(&self.calls).remove(id) {
            Some(call) => {
                call.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding call with `Error::Shutdown`.
    pub fn fail_all(&self) -> usize {
        // ---
        let drained: Vec<PendingCall> = lock_ignore_poison(&self.calls)
            .drain()
            .map(|(_, call)| call)
            .collect();

        let count = drained.len();
        for call in drained {
            call.timer.abort();
            let _ = call.settle.send(Err(Error::Shutdown));
        }
        count
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        lock_ignore_poison(&self.calls).contains_key(id)
    }

    /// Get the number of pending calls
    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.calls).len()
    }
}
