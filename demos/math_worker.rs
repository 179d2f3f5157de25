use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use worker_rpc::transport::stream_channel;
use worker_rpc::{setup_client, setup_server, ClientConfig, Error, OperationError, OperationRegistry, Result, ServerConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

fn math_operations() -> OperationRegistry {
    // ---
    let mut ops = OperationRegistry::new();

    ops.register_typed("add", |(a, b): (i64, i64)| async move { Ok(a + b) })
        .register_typed("distance", |(p, q): (Point, Point)| async move {
            Ok((p.x - q.x).hypot(p.y - q.y))
        })
        .register_typed("divide", |(a, b): (i64, i64)| async move {
            if b == 0 {
                return Err(OperationError::new("RangeError", "division by zero"));
            }
            Ok(a / b)
        });

    ops
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    env_logger::init();

    // Two queues stand in for a worker's message port.
    let (to_worker, worker_inbox) = mpsc::channel::<Bytes>(32);
    let (to_caller, caller_inbox) = mpsc::channel::<Bytes>(32);

    let worker_side = stream_channel(to_caller, worker_inbox);
    let caller_side = stream_channel(to_worker, caller_inbox);

    let server = setup_server(math_operations(), ServerConfig::new(worker_side)).await?;
    println!("worker serving: {}", server.methods().join(", "));

    let client = setup_client(
        caller_side,
        ClientConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_methods(["add", "distance", "divide"]),
    )
    .await?;

    println!("calls time out after {:?}", client.timeout());

    let sum: i64 = client.request("add", (20, 3)).await?;
    println!("20 + 3 = {sum}");

    let distance = client.method("distance")?;
    let d: f64 = distance
        .invoke((Point { x: 0.0, y: 0.0 }, Point { x: 3.0, y: 4.0 }))
        .await?;
    println!("distance = {d}");

    match client.request::<_, i64>("divide", (1, 0)).await {
        Err(Error::Remote(remote)) => println!("divide failed remotely: {remote}"),
        other => println!("unexpected: {other:?}"),
    }

    client.shutdown();
    server.shutdown();
    Ok(())
}
