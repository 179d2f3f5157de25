use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Correlation ID for matching requests to responses
///
/// Carried in-band as the `id` field of every request and response. The
/// value is opaque: any caller-chosen string works as long as it is unique
/// among the caller's outstanding calls.
///
/// The default generator uses UUID v4 in the standard 36-byte format:
/// `550e8400-e29b-41d4-a9b6-446655440000`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    // ---

    /// Generate a new unique correlation ID
    pub fn generate() -> Self {
        // ---
        Self(Uuid::new_v4().to_string())
    }

    /// Get the correlation ID as a string slice
    pub fn as_str(&self) -> &str {
        // ---
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Pluggable correlation-id generator.
///
/// Receives the method name and the call arguments and returns the id for
/// that call. Invoked exactly once per call, synchronously, before the
/// request is posted.
pub type IdGenerator = Arc<dyn Fn(&str, &[Value]) -> String + Send + Sync>;

/// The default generator: a fresh UUID v4 per call, ignoring its inputs.
pub fn default_id_generator() -> IdGenerator {
    Arc::new(|_method: &str, _args: &[Value]| CorrelationId::generate().0)
}
