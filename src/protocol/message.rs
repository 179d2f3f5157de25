use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::ErrorReason;
use crate::{CorrelationId, Result};

/// A call request posted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: CorrelationId,
    pub method: String,

    /// Positional arguments, passed verbatim. Absent means no arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

impl Request {
    pub fn new(id: CorrelationId, method: impl Into<String>, args: Vec<Value>) -> Self {
        // ---
        Self {
            id,
            method: method.into(),
            args: Some(args),
        }
    }

    /// The arguments to spread into the operation; `[]` when absent.
    pub fn args_or_empty(&self) -> Vec<Value> {
        self.args.clone().unwrap_or_default()
    }

    /// Build the fulfilled response for this request, echoing its fields.
    pub fn fulfill(self, value: Value) -> Response {
        Response {
            id: self.id,
            method: self.method,
            args: self.args,
            outcome: Outcome::Fulfilled { value },
        }
    }

    /// Build the rejected response for this request, echoing its fields.
    pub fn reject(self, reason: ErrorReason) -> Response {
        Response {
            id: self.id,
            method: self.method,
            args: self.args,
            outcome: Outcome::Rejected { reason },
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// A response posted by the server: the request fields plus an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: CorrelationId,

    /// Echoed method name. Matching uses only `id`, so a missing method
    /// decodes as empty.
    #[serde(default)]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,

    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Terminal outcome of a call, tagged on the wire by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Fulfilled {
        #[serde(default)]
        value: Value,
    },
    Rejected {
        reason: ErrorReason,
    },
}

/// Decode a payload as a request, or `None` if it is not one.
///
/// A request needs a non-empty string `id` and a string `method`. Payloads
/// carrying a `status` are responses and are rejected here, so a dispatcher
/// sharing a channel never re-dispatches traffic it or its peers answered.
pub(crate) fn decode_request(payload: &[u8]) -> Option<Request> {
    // ---
    let value: Value = serde_json::from_slice(payload).ok()?;
    let obj = value.as_object()?;

    if obj.contains_key("status") {
        return None;
    }

    let id_ok = obj
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    let method_ok = obj.get("method").is_some_and(Value::is_string);

    if !(id_ok && method_ok) {
        return None;
    }

    serde_json::from_value(value).ok()
}

/// Read the top-level `id` of a payload without decoding the rest.
pub(crate) fn peek_id(payload: &[u8]) -> Option<CorrelationId> {
    // ---
    let value: Value = serde_json::from_slice(payload).ok()?;
    value
        .get("id")
        .and_then(Value::as_str)
        .map(CorrelationId::from)
}
