//! Failures raised by server-side operations.

use std::any::{type_name, Any};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use serde_json::Value;

use crate::protocol::ErrorReason;
use crate::RemoteError;

/// A recognized failure of a registered operation.
///
/// Operations return this as their error type. It is projected onto the
/// wire `reason` field-for-field: `name`, `message`, `stack`, `cause`.
///
/// Any `std::error::Error` converts into it, so `?` works inside operations:
/// the name becomes the error's short type name, the message its `Display`
/// output, the cause its `source()` (if any), and the stack a backtrace when
/// `RUST_BACKTRACE` enables capture. A [`RemoteError`], bare or inside
/// [`Error::Remote`](crate::Error::Remote), keeps its original reason, so a
/// worker relaying another worker's failure forwards it as is.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationError {
    name: String,
    message: String,
    stack: Option<String>,
    cause: Option<Value>,
}

impl OperationError {
    /// Create a failure with an explicit name, e.g. `("RangeError", "too big")`.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Create a plain `"Error"`-named failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Value>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Project onto the serializable wire reason.
    pub fn into_reason(self) -> ErrorReason {
        ErrorReason {
            name: self.name,
            message: self.message,
            stack: self.stack,
            cause: self.cause,
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl<E> From<E> for OperationError
where
    E: std::error::Error + 'static,
{
    fn from(err: E) -> Self {
        // ---
        let any = &err as &dyn Any;
        let relayed = match any.downcast_ref::<crate::Error>() {
            Some(crate::Error::Remote(remote)) => Some(remote),
            _ => any.downcast_ref::<RemoteError>(),
        };
        if let Some(remote) = relayed {
            let reason = remote.reason().clone();
            return Self {
                name: reason.name,
                message: reason.message,
                stack: reason.stack,
                cause: reason.cause,
            };
        }

        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            name: short_type_name::<E>().to_owned(),
            message: err.to_string(),
            stack,
            cause: err.source().map(|source| Value::String(source.to_string())),
        }
    }
}

/// `core::num::error::ParseIntError` → `ParseIntError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    // ---
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_explicit_error_projects_all_fields() {
        // ---
        let reason = OperationError::new("RangeError", "too big")
            .with_stack("at op")
            .with_cause(json!({"limit": 10}))
            .into_reason();

        assert_eq!(reason.name, "RangeError");
        assert_eq!(reason.message, "too big");
        assert_eq!(reason.stack.as_deref(), Some("at op"));
        assert_eq!(reason.cause, Some(json!({"limit": 10})));
    }

    #[test]
    fn test_std_error_conversion() {
        // ---
        let parse_err = "x".parse::<i32>().unwrap_err();
        let err = OperationError::from(parse_err);

        assert_eq!(err.name(), "ParseIntError");
        assert_eq!(err.message(), "invalid digit found in string");
    }

    #[test]
    fn test_source_becomes_cause() {
        // ---
        let err = OperationError::from(Outer(std::io::Error::other("disk gone")));

        assert_eq!(err.name(), "Outer");
        assert_eq!(err.message(), "outer failed");
        assert_eq!(err.into_reason().cause, Some(json!("disk gone")));
    }

    #[test]
    fn test_remote_error_is_forwarded_verbatim() {
        // ---
        let reason = ErrorReason {
            name: "TypeError".into(),
            message: "bad".into(),
            stack: Some("remote stack".into()),
            cause: None,
        };
        let err = OperationError::from(RemoteError::from(reason.clone()));
        assert_eq!(err.into_reason(), reason);

        // relayed through a client call result
        let err = OperationError::from(crate::Error::Remote(RemoteError::from(reason.clone())));
        assert_eq!(err.into_reason(), reason);

        let err = OperationError::from(crate::Error::Timeout);
        assert_eq!(err.name(), "Error");
        assert_eq!(err.message(), "request timed out");
    }

    #[test]
    fn test_short_type_name_strips_generics() {
        // ---
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
    }
}
