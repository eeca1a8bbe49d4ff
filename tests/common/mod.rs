use std::time::Duration;

use serde_json::{json, Value};
use wiremock::{Request, ResponseTemplate};

use walletsnap::providers::{RetryPolicy, RetryingClient};

/// Five attempts, no sleeping between them.
#[allow(dead_code)]
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_backoff: Duration::ZERO,
        jitter: Duration::ZERO,
    }
}

#[allow(dead_code)]
pub fn test_client() -> RetryingClient {
    RetryingClient::with_policy(fast_policy(), Duration::from_secs(5))
        .expect("Failed to build HTTP client")
}

/// Like [`test_client`] but with a per-request timeout of `timeout`.
#[allow(dead_code)]
pub fn client_with_timeout(timeout: Duration) -> RetryingClient {
    RetryingClient::with_policy(fast_policy(), timeout).expect("Failed to build HTTP client")
}

fn rpc_body(req: &Request) -> Value {
    serde_json::from_slice(&req.body).unwrap_or(Value::Null)
}

/// Matches a JSON-RPC request for `method`.
#[allow(dead_code)]
pub fn rpc_method(method: &'static str) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| rpc_body(req)["method"] == method
}

/// Matches a JSON-RPC request for `method` whose params value at `pointer`
/// equals `expected` (e.g. `/1/before`).
#[allow(dead_code)]
pub fn rpc_param(
    method: &'static str,
    pointer: &'static str,
    expected: Value,
) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| {
        let body = rpc_body(req);
        body["method"] == method && body["params"].pointer(pointer) == Some(&expected)
    }
}

/// Matches a JSON-RPC request for `method` that has no value at `pointer`.
#[allow(dead_code)]
pub fn rpc_param_absent(
    method: &'static str,
    pointer: &'static str,
) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |req: &Request| {
        let body = rpc_body(req);
        body["method"] == method && body["params"].pointer(pointer).is_none()
    }
}

#[allow(dead_code)]
pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

#[allow(dead_code)]
pub fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message },
    }))
}

/// Price API payload with `(value, rfc3339)` points.
#[allow(dead_code)]
pub fn price_points(points: &[(&str, &str)]) -> ResponseTemplate {
    let prices: Vec<Value> = points
        .iter()
        .map(|(value, ts)| json!({ "value": value, "timestamp": ts }))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "prices": prices } }))
}
