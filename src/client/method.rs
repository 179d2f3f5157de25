use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::WorkerClient;
use crate::Result;

/// A callable wrapper for one remote method.
///
/// Obtained from [`WorkerClient::method`] or [`WorkerClient::methods`].
/// Cheap to clone; every call goes through the owning client's pending table
/// and timeout.
#[derive(Clone)]
pub struct RemoteMethod {
    client: WorkerClient,
    name: Arc<str>,
}

impl RemoteMethod {
    pub(super) fn new(client: WorkerClient, name: Arc<str>) -> Self {
        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call with raw positional arguments.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value> {
        self.client.call(&self.name, args).await
    }

    /// Call with typed arguments and a typed result.
    ///
    /// See [`WorkerClient::request`] for how `args` become positional
    /// arguments.
    pub async fn invoke<A, R>(&self, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.client.request(&self.name, args).await
    }
}

impl fmt::Debug for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteMethod").field(&self.name).finish()
    }
}
