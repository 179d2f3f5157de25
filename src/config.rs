//! Client and server setup options.
//!
//! Both configs are plain values with defaults and consuming `with_*`
//! setters; nothing is read from files or the environment.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::correlation::{default_id_generator, IdGenerator};
use crate::{ChannelPtr, Error, Result};

/// Default time a call may stay pending before it fails with a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for [`WorkerClient::setup`](crate::WorkerClient::setup).
#[derive(Clone)]
pub struct ClientConfig {
    // ---
    /// Maximum time a call may remain pending.
    ///
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Generates the correlation id for each call from `(method, args)`.
    ///
    /// Default: a random UUID v4 per call.
    pub id_generator: IdGenerator,

    /// Remote method names this client may call.
    ///
    /// `None` allows any non-empty name. When set, calls to other names fail
    /// with [`Error::UnknownMethod`] without posting anything.
    pub methods: Option<Vec<String>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        // ---
        Self {
            timeout: DEFAULT_TIMEOUT,
            id_generator: default_id_generator(),
            methods: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use worker_rpc::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new().with_timeout(Duration::from_secs(5));
    /// assert_eq!(config.timeout, Duration::from_secs(5));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the correlation-id generator.
    ///
    /// The generator must return ids that are unique among the client's
    /// outstanding calls; a repeat fails that call with
    /// [`Error::DuplicateCallId`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::atomic::{AtomicU64, Ordering};
    /// use worker_rpc::ClientConfig;
    ///
    /// let next = AtomicU64::new(0);
    /// let config = ClientConfig::new().with_id_generator(move |method, _args| {
    ///     format!("{method}-{}", next.fetch_add(1, Ordering::Relaxed))
    /// });
    /// assert_eq!((config.id_generator)("add", &[]), "add-0");
    /// ```
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str, &[Value]) -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    /// Restrict the client to an explicit list of remote methods.
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Check the method list: names must be non-empty and unique.
    pub(crate) fn validate(&self) -> Result<()> {
        // ---
        let Some(methods) = &self.methods else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        for name in methods {
            if name.is_empty() {
                return Err(Error::Config("method names must not be empty".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!("method '{name}' listed twice")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("timeout", &self.timeout)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Options for [`WorkerServer::setup`](crate::WorkerServer::setup).
#[derive(Clone, Default)]
pub struct ServerConfig {
    // ---
    /// Channel the server answers on. Required: there is no implicit
    /// process-wide channel.
    pub target: Option<ChannelPtr>,
}

impl ServerConfig {
    /// Config bound to `target`.
    pub fn new(target: ChannelPtr) -> Self {
        Self {
            target: Some(target),
        }
    }

    pub fn with_target(mut self, target: ChannelPtr) -> Self {
        self.target = Some(target);
        self
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("target", &self.target.as_ref().map(|_| ".."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_client_defaults() {
        // ---
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.methods.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_method_list_validation() {
        // ---
        let ok = ClientConfig::new().with_methods(["add", "fail"]);
        assert!(ok.validate().is_ok());

        let empty = ClientConfig::new().with_methods([""]);
        assert!(matches!(empty.validate(), Err(Error::Config(_))));

        let dup = ClientConfig::new().with_methods(["add", "add"]);
        assert!(matches!(dup.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_server_config_requires_explicit_target() {
        // ---
        assert!(ServerConfig::default().target.is_none());
        let (left, _right) = crate::transport::memory_pair();
        assert!(ServerConfig::new(left).target.is_some());
    }
}
