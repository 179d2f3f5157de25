use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_ERROR_NAME: &str = "UnknownError";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Serializable projection of a failure, carried by rejected responses.
///
/// Never the failure itself: only these four fields cross the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReason {
    /// A missing name decodes as `UnknownError`.
    #[serde(default = "unknown_name")]
    pub name: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
}

fn unknown_name() -> String {
    UNKNOWN_ERROR_NAME.to_owned()
}

impl ErrorReason {
    /// The fixed reason used when a failure has no recognizable shape.
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_ERROR_NAME.to_owned(),
            message: UNKNOWN_ERROR_MESSAGE.to_owned(),
            stack: None,
            cause: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_ERROR_NAME
    }
}
