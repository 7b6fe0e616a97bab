//! Router construction and request dispatch.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use http::StatusCode;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use ws_relay::ProxyEndpoint;

use crate::cache::{self, ResponseCache};
use crate::forward;

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<ProxyEndpoint>,
    pub client: reqwest::Client,
    pub cache: Arc<ResponseCache>,
}

/// Build the gateway router: liveness, the proxied API surface, and the
/// ambient layers (cache inside, compression and tracing outside).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/apis/{*path}", any(apis))
        .layer(middleware::from_fn_with_state(state.clone(), cache::layer))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness answer; never touches the backend.
async fn health() -> &'static str {
    "OK"
}

/// Dispatch one `/apis/*` request: WebSocket upgrades go through the
/// relay, everything else is forwarded as plain REST.
async fn apis(
    State(state): State<AppState>,
    request: Request,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let ws = WebSocketUpgrade::from_request_parts(&mut parts, &state)
        .await
        .ok();

    match ws {
        Some(upgrade) => {
            ws_relay::serve(
                Arc::clone(&state.endpoint),
                upgrade,
                &parts.headers,
                &path_and_query,
            )
            .await
        }
        None => {
            let body = match axum::body::to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(%err, "failed to read request body");
                    return (StatusCode::BAD_REQUEST, "failed to read request body")
                        .into_response();
                }
            };
            forward::forward(
                &state.client,
                &state.endpoint,
                parts.method,
                &path_and_query,
                parts.headers,
                body,
            )
            .await
        }
    }
}
