use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::OperationError;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one operation invocation.
pub type OperationResult = std::result::Result<Value, OperationError>;

/// A type-erased, callable operation.
///
/// Receives the positional arguments of a request and resolves to the value
/// to send back or the failure to report.
pub trait Operation: Send + Sync + 'static {
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, OperationResult>;
}

/// Operation over the raw positional argument list.
struct RawOperation<F> {
    func: F,
}

impl<F, Fut> Operation for RawOperation<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, OperationResult> {
        Box::pin((self.func)(args))
    }
}

/// Operation whose arguments are spread into a typed tuple.
struct TypedOperation<F, A, R, Fut> {
    func: F,
    _phantom: PhantomData<fn(A) -> (R, Fut)>,
}

impl<F, A, R, Fut> Operation for TypedOperation<F, A, R, Fut>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, OperationError>> + Send + 'static,
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, OperationResult> {
        // ---
        let input: A = match spread(args) {
            Ok(input) => input,
            Err(err) => {
                let failure = OperationError::new("TypeError", format!("invalid arguments: {err}"));
                return Box::pin(async move { Err(failure) });
            }
        };

        let fut = (self.func)(input);

        Box::pin(async move {
            let output = fut.await?;
            serde_json::to_value(output)
                .map_err(|err| OperationError::new("SerializationError", err.to_string()))
        })
    }
}

/// Deserialize a positional argument list into `A`.
///
/// The list is read as a JSON array, so tuples receive one element per
/// argument. An empty list also matches `()` and other unit-like inputs.
fn spread<A: DeserializeOwned>(args: Vec<Value>) -> serde_json::Result<A> {
    // ---
    if args.is_empty() {
        if let Ok(input) = serde_json::from_value(Value::Null) {
            return Ok(input);
        }
    }
    serde_json::from_value(Value::Array(args))
}

/// Mapping from method name to operation.
///
/// Built during server setup and frozen once the server is running; every
/// dispatch reads it through a shared `Arc`.
///
/// # Example
///
/// ```
/// use worker_rpc::{OperationError, OperationRegistry};
///
/// let mut ops = OperationRegistry::new();
/// ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) })
///     .register_typed("fail", |()| async move {
///         Err::<(), _>(OperationError::error("boom"))
///     });
///
/// assert_eq!(ops.names(), vec!["add", "fail"]);
/// ```
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation over the raw argument list.
    ///
    /// Registering a name twice replaces the earlier operation.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.insert(name, Arc::new(RawOperation { func }))
    }

    /// Register an operation whose arguments are spread into `A`.
    ///
    /// `A` is usually a tuple: `(i64, i64)` for two arguments, `(String,)`
    /// for one, `()` for none. Arguments that do not fit `A` reject the call
    /// with a `TypeError`.
    pub fn register_typed<F, A, R, Fut>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, OperationError>> + Send + 'static,
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let operation = TypedOperation {
            func,
            _phantom: PhantomData,
        };
        self.insert(name, Arc::new(operation))
    }

    /// Register a method bound to a shared instance.
    ///
    /// The instance is handed to every invocation, so stateful services can
    /// expose their methods without cloning the `Arc` by hand.
    pub fn register_method<T, F, A, R, Fut>(
        &mut self,
        name: impl Into<String>,
        instance: &Arc<T>,
        method: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, OperationError>> + Send + 'static,
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let instance = instance.clone();
        self.register_typed(name, move |args: A| method(instance.clone(), args))
    }

    /// Register an already type-erased operation.
    pub fn insert(&mut self, name: impl Into<String>, operation: Arc<dyn Operation>) -> &mut Self {
        self.operations.insert(name.into(), operation);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.operations.remove(name).is_some()
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
