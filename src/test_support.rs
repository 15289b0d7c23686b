//! Local JSON-RPC node for tests.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::task::JoinHandle;

type Responder = dyn Fn(&Value) -> (StatusCode, Value) + Send + Sync;

#[derive(Clone)]
struct StubState {
    responder: Arc<Responder>,
    calls: Arc<AtomicUsize>,
}

/// Answers every POST on `/` with whatever the responder returns for the
/// decoded request body.
pub struct RpcStub {
    base_url: String,
    calls: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl RpcStub {
    pub async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = StubState {
            responder: Arc::new(responder),
            calls: calls.clone(),
        };
        let app = Router::new().route("/", post(answer)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test port");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}:{}", addr.ip(), addr.port()),
            calls,
            handle,
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for RpcStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn answer(State(state): State<StubState>, Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let (status, body) = (state.responder)(&request);
    (status, Json(body))
}

pub fn rpc_result(request: &Value, result: Value) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result }),
    )
}

pub fn rpc_error(request: &Value, code: i64, message: &str) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "error": { "code": code, "message": message }
        }),
    )
}
