//! HTTP facade routes.
//!
//! Thin plumbing over the manager handle: every endpoint either reads
//! published state or enqueues one control operation. Callers only
//! ever see the status string and synchronous success/failure, never
//! internal errors.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use wabridge_connection::{ManagerError, ManagerHandle};
use wabridge_core::traits::SendError;

/// Build the facade router.
pub fn router(handle: ManagerHandle) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/qr", get(qr))
        .route("/logs", get(logs))
        .route("/health", get(health))
        .route("/pair", post(pair))
        .route("/reset", get(reset))
        .route("/send", post(send))
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn qr(State(handle): State<ManagerHandle>) -> Json<serde_json::Value> {
    let snap = handle.snapshot();
    Json(json!({
        "status": snap.status,
        "qr": snap.artifact.as_ref().and_then(|a| a.qr()),
        "pairingCode": snap.artifact.as_ref().and_then(|a| a.code()),
    }))
}

async fn logs(State(handle): State<ManagerHandle>) -> Json<serde_json::Value> {
    Json(json!({ "logs": handle.logs() }))
}

async fn health(State(handle): State<ManagerHandle>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "whatsapp": handle.snapshot().status,
    }))
}

#[derive(Debug, Deserialize)]
struct PairRequest {
    #[serde(rename = "phoneNumber")]
    phone_number: String,
}

async fn pair(
    State(handle): State<ManagerHandle>,
    Json(req): Json<PairRequest>,
) -> impl IntoResponse {
    match handle.pair(&req.phone_number).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(ManagerError::InvalidPhone) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "invalid phone number" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}

async fn reset(State(handle): State<ManagerHandle>) -> impl IntoResponse {
    match handle.reset().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    to: String,
    text: String,
}

async fn send(
    State(handle): State<ManagerHandle>,
    Json(req): Json<SendRequest>,
) -> impl IntoResponse {
    match handle.send_text(&req.to, &req.text).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(SendError::NotConnected) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "not connected" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>WhatsApp Bridge</title>
    <style>
        body {
            margin: 0;
            padding: 40px;
            background: #1e1e1e;
            color: #d4d4d4;
            font-family: system-ui, sans-serif;
        }
        h1 { color: #fff; margin-bottom: 10px; }
        .status {
            font-size: 14px;
            margin-bottom: 20px;
        }
        .connected { color: #4a4; }
        .waiting { color: #ca4; }
        .down { color: #a44; }
        #qr img { background: #fff; padding: 12px; border-radius: 8px; }
        #code {
            font-size: 32px;
            letter-spacing: 4px;
            font-family: Menlo, Monaco, "Courier New", monospace;
        }
        #logs {
            margin-top: 30px;
            font-family: Menlo, Monaco, "Courier New", monospace;
            font-size: 12px;
            white-space: pre-wrap;
            color: #888;
        }
    </style>
</head>
<body>
    <h1>WhatsApp Bridge</h1>
    <div class="status" id="status">Loading...</div>
    <div id="qr"></div>
    <div id="code"></div>
    <div id="logs"></div>

    <script>
        const statusEl = document.getElementById('status');
        const qrEl = document.getElementById('qr');
        const codeEl = document.getElementById('code');
        const logsEl = document.getElementById('logs');

        async function refresh() {
            try {
                const state = await (await fetch('/qr')).json();
                statusEl.textContent = state.status;
                statusEl.className = 'status ' + (
                    state.status === 'connected' ? 'connected' :
                    (state.status === 'scanning' || state.status === 'pairing') ? 'waiting' : 'down');
                qrEl.innerHTML = state.qr ? `<img src="${state.qr}" width="256" height="256">` : '';
                codeEl.textContent = state.pairingCode || '';

                const logs = await (await fetch('/logs')).json();
                logsEl.textContent = logs.logs.join('\n');
            } catch (e) {
                statusEl.textContent = 'bridge unreachable';
                statusEl.className = 'status down';
            }
        }

        refresh();
        setInterval(refresh, 2000);
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_request_uses_camel_case() {
        let req: PairRequest = serde_json::from_str(r#"{"phoneNumber":"15551234567"}"#).unwrap();
        assert_eq!(req.phone_number, "15551234567");
    }

    #[test]
    fn send_request_shape() {
        let req: SendRequest =
            serde_json::from_str(r#"{"to":"15551234567","text":"hello"}"#).unwrap();
        assert_eq!(req.to, "15551234567");
        assert_eq!(req.text, "hello");
    }
}
