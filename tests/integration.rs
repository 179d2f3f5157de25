use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use worker_rpc::{
    //
    transport,
    ChannelPtr,
    ClientConfig,
    Error,
    OperationError,
    OperationRegistry,
    OperationSource,
    Operations,
    Result,
    ServerConfig,
    WorkerClient,
    WorkerServer,
};

fn math_operations() -> OperationRegistry {
    // ---
    let mut ops = OperationRegistry::new();

    ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) })
        .register_typed("fail", |()| async move {
            Err::<(), _>(OperationError::error("boom"))
        })
        .register_typed("slow", |(ms,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        })
        .register_typed("parse", |(text,): (String,)| async move {
            let n: i64 = text.parse()?;
            Ok::<_, OperationError>(n)
        })
        .register_typed("explode", |()| async move {
            if true {
                panic!("operation blew up");
            }
            Ok(())
        });

    ops
}

struct MathWorker {
    // ---
    _server: WorkerServer,
    caller_side: ChannelPtr,
}

impl MathWorker {
    // ---
    async fn new() -> Result<Self> {
        // ---
        let (worker_side, caller_side) = transport::memory_pair();
        let server = WorkerServer::setup(math_operations(), ServerConfig::new(worker_side)).await?;

        Ok(Self {
            _server: server,
            caller_side,
        })
    }

    async fn client(&self, config: ClientConfig) -> Result<WorkerClient> {
        WorkerClient::setup(self.caller_side.clone(), config).await
    }
}

#[tokio::test]
async fn test_basic_request() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker
        .client(ClientConfig::new().with_id_generator(|_, _| "c1".to_owned()))
        .await?;

    log::info!("sending add 2 3...");
    let value = client.call("add", vec![json!(2), json!(3)]).await?;
    assert_eq!(value, json!(5));

    let sum: i64 = client.request("add", (20, 3)).await?;
    assert_eq!(sum, 23);

    assert_eq!(client.pending_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_complete_out_of_order() {
    // ---
    init_logging();

    let worker = MathWorker::new().await.unwrap();
    let client = worker.client(ClientConfig::new()).await.unwrap();

    let mut handles: Vec<JoinHandle<u64>> = Vec::new();

    // Later calls finish first.
    for i in 0..10u64 {
        let c = client.clone();
        handles.push(tokio::spawn(async move {
            c.request("slow", (100 - i * 10,)).await.unwrap()
        }));
    }

    for (i, task) in handles.into_iter().enumerate() {
        let ms = task.await.unwrap();
        assert_eq!(ms, 100 - (i as u64) * 10);
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_remote_failure_is_reconstructed() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;

    let err = client.call("fail", vec![]).await.unwrap_err();
    match err {
        Error::Remote(remote) => {
            assert_eq!(remote.name(), "Error");
            assert_eq!(remote.message(), "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client.call("parse", vec![json!("nope")]).await.unwrap_err();
    match err {
        Error::Remote(remote) => assert_eq!(remote.name(), "ParseIntError"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(client.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_panicking_operation_reports_unknown_error() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;

    let err = client.call("explode", vec![]).await.unwrap_err();
    match err {
        Error::Remote(remote) => {
            assert_eq!(remote.name(), "UnknownError");
            assert_eq!(remote.message(), "Unknown error");
            assert!(remote.is_unknown());
            assert!(remote.stack().is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // the dispatcher survives the panic
    assert_eq!(client.call("add", vec![json!(1), json!(1)]).await?, json!(2));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_late_response_is_ignored() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker
        .client(ClientConfig::new().with_timeout(Duration::from_millis(10)))
        .await?;

    let started = tokio::time::Instant::now();
    let err = client.call("slow", vec![json!(1000)]).await.unwrap_err();

    assert!(matches!(err, Error::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert_eq!(client.pending_calls(), 0);

    // let the server answer the abandoned call
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(client.pending_calls(), 0);

    // the client is still usable
    let fast = client.call("add", vec![json!(2), json!(2)]).await?;
    assert_eq!(fast, json!(4));
    Ok(())
}

#[tokio::test]
async fn test_method_list_is_enforced() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker
        .client(ClientConfig::new().with_methods(["add", "fail"]))
        .await?;

    let names: Vec<String> = client.methods().iter().map(|m| m.name().to_owned()).collect();
    assert_eq!(names, vec!["add", "fail"]);

    let add = client.method("add")?;
    let sum: i64 = add.invoke((4, 5)).await?;
    assert_eq!(sum, 9);

    assert!(matches!(client.method("slow"), Err(Error::UnknownMethod(_))));
    assert!(matches!(
        client.call("slow", vec![json!(1)]).await,
        Err(Error::UnknownMethod(name)) if name == "slow"
    ));
    assert_eq!(client.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_method_list_fails_setup() -> Result<()> {
    // ---
    let worker = MathWorker::new().await?;
    let result = worker.client(ClientConfig::new().with_methods(["add", "add"])).await;
    assert!(matches!(result, Err(Error::Config(_))));
    Ok(())
}

#[tokio::test]
async fn test_empty_method_name_is_rejected() -> Result<()> {
    // ---
    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;
    assert!(matches!(client.method(""), Err(Error::UnknownMethod(_))));
    Ok(())
}

#[derive(Default)]
struct Counter {
    total: AtomicU64,
}

impl Operations for Counter {
    fn expose(self: Arc<Self>, ops: &mut OperationRegistry) {
        // ---
        ops.register_method("increment", &self, |this, (by,): (u64,)| async move {
            Ok(this.total.fetch_add(by, Ordering::SeqCst) + by)
        });
        ops.register_method("total", &self, |this, ()| async move {
            Ok(this.total.load(Ordering::SeqCst))
        });
    }
}

async fn counter_roundtrip(source: OperationSource) -> Result<u64> {
    // ---
    let (worker_side, caller_side) = transport::memory_pair();
    let _server = WorkerServer::setup(source, ServerConfig::new(worker_side)).await?;
    let client = WorkerClient::setup(caller_side, ClientConfig::new()).await?;

    let _: u64 = client.request("increment", (2,)).await?;
    let _: u64 = client.request("increment", (5,)).await?;
    client.request("total", ()).await
}

#[tokio::test]
async fn test_factory_source_keeps_state() -> Result<()> {
    // ---
    init_logging();
    assert_eq!(counter_roundtrip(OperationSource::factory::<Counter>()).await?, 7);
    Ok(())
}

#[tokio::test]
async fn test_instance_source_shares_state() -> Result<()> {
    // ---
    init_logging();

    let counter = Arc::new(Counter {
        total: AtomicU64::new(100),
    });
    assert_eq!(counter_roundtrip(OperationSource::shared(counter.clone())).await?, 107);
    assert_eq!(counter.total.load(Ordering::SeqCst), 107);
    Ok(())
}

#[tokio::test]
async fn test_foreign_traffic_does_not_disturb_calls() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;

    // unrelated traffic in both directions
    let (worker_side, caller_side) = (worker._server.target().clone(), worker.caller_side.clone());
    worker_side.post(bytes::Bytes::from_static(b"not json")).await?;
    worker_side.post(bytes::Bytes::from_static(br#"{"id":"x","status":"fulfilled"}"#)).await?;
    caller_side.post(bytes::Bytes::from_static(br#"{"kind":"telemetry","value":1}"#)).await?;

    assert_eq!(client.call("add", vec![json!(1), json!(2)]).await?, json!(3));
    Ok(())
}

#[tokio::test]
async fn test_idle_listener_does_not_stall_shared_channel() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker
        .client(ClientConfig::new().with_timeout(Duration::from_millis(500)))
        .await?;

    // subscribed on the caller side but never read
    let _idle = worker.caller_side.subscribe().await?;

    for i in 0..200i64 {
        let sum: i64 = client.request("add", (i, 1)).await?;
        assert_eq!(sum, i + 1);
    }

    let second = tokio::time::timeout(
        Duration::from_secs(1),
        worker.client(ClientConfig::new().with_timeout(Duration::from_millis(500))),
    )
    .await
    .expect("second client setup stalled")?;

    assert_eq!(second.call("add", vec![json!(1), json!(2)]).await?, json!(3));
    assert_eq!(client.call("add", vec![json!(3), json!(4)]).await?, json!(7));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_calls_after_shutdown_fail_fast() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;

    let mut raw = worker._server.target().subscribe().await?;
    client.shutdown();

    let started = tokio::time::Instant::now();
    assert!(matches!(client.call("add", vec![json!(1), json!(2)]).await, Err(Error::Shutdown)));
    assert!(started.elapsed() < client.timeout());
    assert_eq!(client.pending_calls(), 0);

    // nothing was posted
    let next = tokio::time::timeout(Duration::from_millis(50), raw.inbox.recv()).await;
    assert!(next.is_err(), "unexpected post after shutdown: {next:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_pending_calls() -> Result<()> {
    // ---
    init_logging();

    let worker = MathWorker::new().await?;
    let client = worker.client(ClientConfig::new()).await?;

    let c = client.clone();
    let call = tokio::spawn(async move { c.call("slow", vec![json!(5000)]).await });

    while client.pending_calls() == 0 {
        tokio::task::yield_now().await;
    }
    client.shutdown();

    assert!(matches!(call.await.unwrap(), Err(Error::Shutdown)));
    assert_eq!(client.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_server_requires_target() {
    // ---
    let result = WorkerServer::setup(math_operations(), ServerConfig::default()).await;
    assert!(matches!(result, Err(Error::MissingConfig(ref what)) if what == "target"));
}

#[tokio::test]
async fn test_server_run_returns_after_channel_close() -> Result<()> {
    // ---
    init_logging();

    let (worker_side, caller_side) = transport::memory_pair();
    let server = WorkerServer::setup(math_operations(), ServerConfig::new(worker_side)).await?;

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    caller_side.close().await?;
    runner.await.expect("server task panicked")?;
    Ok(())
}

#[tokio::test]
async fn test_setup_helpers() -> Result<()> {
    // ---
    init_logging();

    let (worker_side, caller_side) = transport::memory_pair();
    let server = worker_rpc::setup_server(math_operations(), ServerConfig::new(worker_side)).await?;
    let client = worker_rpc::setup_client(caller_side, ClientConfig::new()).await?;

    assert_eq!(server.methods(), vec!["add", "explode", "fail", "parse", "slow"]);
    assert_eq!(client.call("add", vec![json!(-1), json!(1)]).await?, Value::from(0));
    Ok(())
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
