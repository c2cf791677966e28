//! Load testing for the JSON-RPC server.

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use rpc_mux::config::ServerConfig;
use rpc_mux::observability::{logging_middleware, metrics_middleware};

mod common;

#[tokio::test]
async fn test_load_performance() {
    // 1. Start server with the production middleware stack
    let server = common::start_server(
        ServerConfig::default(),
        vec![logging_middleware(), metrics_middleware()],
    )
    .await;

    // 2. Run load: every task alternates single calls and small batches
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = server.url("/rpc/v1/");
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let id = task * requests_per_task + i;
                let payload = if i % 2 == 0 {
                    json!({"jsonrpc": "2.0", "method": "echo", "params": {"Text": id.to_string()}, "id": id})
                } else {
                    json!([
                        {"jsonrpc": "2.0", "method": "echo", "params": {"Text": "a"}, "id": id},
                        {"jsonrpc": "2.0", "method": "echo", "params": {"Text": "b"}, "id": -1}
                    ])
                };

                let req_start = Instant::now();
                let Ok(res) = client.post(&url).json(&payload).send().await else {
                    continue;
                };
                let Ok(body) = res.json::<Value>().await else {
                    continue;
                };

                let first = if body.is_array() { &body[0] } else { &body };
                if first["id"] == json!(id) && first.get("result").is_some() {
                    latencies.push(req_start.elapsed());
                }
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    if all_latencies.is_empty() {
        panic!("No successful requests recorded");
    }

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("Success Rate:   {}/{}", all_latencies.len(), total_requests);
    println!("-------------------------\n");

    assert_eq!(all_latencies.len(), total_requests);
    server.shutdown.trigger();
}
