//! Where a server's operations come from.

use std::fmt;
use std::sync::Arc;

use super::OperationRegistry;
use crate::log_warn;

/// Name never exposed as an operation, whatever the source.
const CONSTRUCTOR: &str = "constructor";

/// A value whose behavior set can be enumerated into operations.
///
/// Implement this for stateful services. `expose` receives the shared
/// instance so registered operations can keep it alive and call into it.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
/// use worker_rpc::{OperationRegistry, Operations};
///
/// #[derive(Default)]
/// struct Counter {
///     total: AtomicU64,
/// }
///
/// impl Operations for Counter {
///     fn expose(self: Arc<Self>, ops: &mut OperationRegistry) {
///         ops.register_method("increment", &self, |this, (by,): (u64,)| async move {
///             Ok(this.total.fetch_add(by, Ordering::SeqCst) + by)
///         });
///         ops.register_method("total", &self, |this, ()| async move {
///             Ok(this.total.load(Ordering::SeqCst))
///         });
///     }
/// }
/// ```
pub trait Operations: Send + Sync + 'static {
    /// Add this instance's operations to `ops`.
    fn expose(self: Arc<Self>, ops: &mut OperationRegistry);
}

type Factory = Box<dyn FnOnce() -> Arc<dyn Operations> + Send>;

/// The three shapes a server's operations can be given in.
///
/// Resolved once, at setup, into a single immutable [`OperationRegistry`].
pub enum OperationSource {
    /// Named callables, used as-is.
    Mapping(OperationRegistry),

    /// Builds an instance with no arguments, then enumerates it.
    Factory(Factory),

    /// An already-built instance, enumerated directly.
    Instance(Arc<dyn Operations>),
}

impl OperationSource {
    /// Instantiate `T` through `Default` at setup time.
    pub fn factory<T>() -> Self
    where
        T: Operations + Default,
    {
        Self::Factory(Box::new(|| Arc::new(T::default()) as Arc<dyn Operations>))
    }

    /// Instantiate through a custom zero-argument constructor at setup time.
    pub fn from_fn<T, F>(build: F) -> Self
    where
        T: Operations,
        F: FnOnce() -> T + Send + 'static,
    {
        Self::Factory(Box::new(move || Arc::new(build()) as Arc<dyn Operations>))
    }

    /// Use an existing instance.
    pub fn instance<T: Operations>(instance: T) -> Self {
        Self::Instance(Arc::new(instance))
    }

    /// Use an instance that is also shared elsewhere.
    pub fn shared<T: Operations>(instance: Arc<T>) -> Self {
        Self::Instance(instance)
    }

    /// Resolve into the registry the dispatcher will serve.
    pub(crate) fn resolve(self) -> OperationRegistry {
        // ---
        let mut registry = match self {
            OperationSource::Mapping(registry) => registry,
            OperationSource::Factory(build) => enumerate(build()),
            OperationSource::Instance(instance) => enumerate(instance),
        };

        if registry.remove(CONSTRUCTOR) {
            log_warn!("operation named '{CONSTRUCTOR}' is never exposed; dropped");
        }

        registry
    }
}

fn enumerate(instance: Arc<dyn Operations>) -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    instance.expose(&mut registry);
    registry
}

impl From<OperationRegistry> for OperationSource {
    fn from(registry: OperationRegistry) -> Self {
        Self::Mapping(registry)
    }
}

impl fmt::Debug for OperationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            OperationSource::Mapping(registry) => f
                .debug_tuple("Mapping")
                .field(&registry.names())
                .finish(),
            OperationSource::Factory(_) => f.write_str("Factory(..)"),
            OperationSource::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Greeter {
        greeting: String,
    }

    impl Default for Greeter {
        fn default() -> Self {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Self {
                greeting: "hello".into(),
            }
        }
    }

    impl Operations for Greeter {
        fn expose(self: Arc<Self>, ops: &mut OperationRegistry) {
            ops.register_method("greet", &self, |this, (name,): (String,)| async move {
                Ok(format!("{} {name}", this.greeting))
            });
            ops.register_typed(CONSTRUCTOR, |()| async move { Ok(()) });
        }
    }

    #[test]
    fn test_mapping_used_as_is() {
        // ---
        let mut ops = OperationRegistry::new();
        ops.register_typed("a", |()| async move { Ok(1) });

        let registry = OperationSource::from(ops).resolve();
        assert_eq!(registry.names(), vec!["a"]);
    }

    #[test]
    fn test_factory_builds_once_at_resolve() {
        // ---
        let before = BUILT.load(Ordering::SeqCst);
        let source = OperationSource::factory::<Greeter>();
        assert_eq!(BUILT.load(Ordering::SeqCst), before);

        let registry = source.resolve();
        assert_eq!(BUILT.load(Ordering::SeqCst), before + 1);
        assert_eq!(registry.names(), vec!["greet"]);
    }

    #[test]
    fn test_instance_excludes_constructor() {
        // ---
        let source = OperationSource::instance(Greeter {
            greeting: "hi".into(),
        });
        let registry = source.resolve();

        assert!(registry.contains("greet"));
        assert!(!registry.contains(CONSTRUCTOR));
    }

    #[test]
    fn test_from_fn_factory() {
        // ---
        let source = OperationSource::from_fn(|| Greeter {
            greeting: "hey".into(),
        });
        assert!(format!("{source:?}").starts_with("Factory"));
        assert_eq!(source.resolve().names(), vec!["greet"]);
    }
}
