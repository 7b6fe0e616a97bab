//! Bidirectional WebSocket relay between a client upgrade and a backend
//! dial.
//!
//! Per connection: `Handshaking → Relaying → Closing → Closed`. The
//! handshake translates headers and dials the backend before the client
//! upgrade is answered, so a rejected dial surfaces the backend's own
//! status instead of a half-open session. Relaying runs three tasks (two
//! directional pumps and a keepalive ticker); the first terminal result
//! from any of them tears the whole session down.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message as BackendMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::endpoint::ProxyEndpoint;
use crate::tls::TlsTrustPolicy;
use crate::{headers, origin};

/// Ping cadence toward the client.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Deadline for any single keepalive write.
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ClientSink = SplitSink<WebSocket, Message>;

/// Handle one WebSocket upgrade request: translate headers, dial the
/// backend, validate the origin, then upgrade the client and relay frames
/// until either leg fails.
pub async fn serve(
    endpoint: Arc<ProxyEndpoint>,
    ws: WebSocketUpgrade,
    inbound_headers: &HeaderMap,
    path_and_query: &str,
) -> Response {
    let connection_id = Uuid::new_v4();

    let mut inbound = inbound_headers.clone();
    headers::strip_denylisted(&mut inbound);

    let translation = match headers::translate(&inbound) {
        Ok(translation) => translation,
        Err(err) => {
            warn!(%connection_id, %err, "failed to build proxy headers");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("failed to build proxy headers: {err}"),
            );
        }
    };

    let target = endpoint.ws_url(path_and_query);

    let backend = match dial_backend(&target, &translation.headers, endpoint.trust).await {
        Ok(backend) => backend,
        Err(failure) => {
            error!(
                %connection_id,
                target = %target,
                detail = %failure.detail,
                "failed to dial backend"
            );
            return error_response(
                failure.status,
                &format!("failed to dial backend: {}", failure.detail),
            );
        }
    };

    // The backend socket drops right here when the origin is refused.
    if let Err(rejection) = origin::check_origin(inbound_headers, endpoint.origin.as_deref()) {
        warn!(%connection_id, %rejection, "refusing websocket upgrade");
        return error_response(StatusCode::FORBIDDEN, "origin not allowed");
    }

    let ws = match &translation.subprotocol {
        Some(protocol) => ws.protocols([protocol.clone()]),
        None => ws,
    };

    info!(%connection_id, target = %target, "relaying websocket session");

    let mut response = ws.on_upgrade(move |client| relay_session(client, backend, connection_id));
    apply_csp(response.headers_mut());
    response
}

struct DialFailure {
    status: StatusCode,
    detail: String,
}

/// Open the backend WebSocket with the translated header set. A rejection
/// carrying an HTTP response keeps the backend's status; everything else
/// maps to 502.
async fn dial_backend(
    target: &str,
    outbound: &HeaderMap,
    trust: TlsTrustPolicy,
) -> Result<BackendSocket, DialFailure> {
    let mut request = target.into_client_request().map_err(|err| DialFailure {
        status: StatusCode::BAD_GATEWAY,
        detail: err.to_string(),
    })?;

    for (name, value) in outbound.iter() {
        // The dialer derives Host from the rewritten URL.
        if name == &header::HOST {
            continue;
        }
        request.headers_mut().append(name.clone(), value.clone());
    }

    match tokio_tungstenite::connect_async_tls_with_config(
        request,
        None,
        false,
        trust.ws_connector(),
    )
    .await
    {
        Ok((socket, _response)) => Ok(socket),
        Err(tungstenite::Error::Http(response)) => Err(DialFailure {
            status: response.status(),
            detail: format!("backend rejected the handshake with {}", response.status()),
        }),
        Err(err) => Err(DialFailure {
            status: StatusCode::BAD_GATEWAY,
            detail: err.to_string(),
        }),
    }
}

/// Terminal outcome reported by one of the three relay tasks.
#[derive(Debug)]
enum SessionEnd {
    BackendEof,
    ClientEof,
    BackendRead(String),
    ClientRead(String),
    BackendWrite(String),
    ClientWrite(String),
    PingFailed(String),
}

/// Run the pumps and the keepalive until the first of them reports a
/// terminal result, then abort the rest so both sockets drop.
async fn relay_session(client: WebSocket, backend: BackendSocket, connection_id: Uuid) {
    let (client_sink, client_stream) = client.split();
    let (backend_sink, backend_stream) = backend.split();

    // The keepalive and the backend->client pump write to the client
    // concurrently; the sink demands a single writer at a time.
    let client_sink = Arc::new(Mutex::new(client_sink));

    // One slot per reporting task, so no sender can be stranded behind a
    // slow receiver.
    let (done_tx, mut done_rx) = mpsc::channel::<SessionEnd>(3);

    let tasks = [
        tokio::spawn(pump_backend_to_client(
            backend_stream,
            Arc::clone(&client_sink),
            done_tx.clone(),
        )),
        tokio::spawn(pump_client_to_backend(
            client_stream,
            backend_sink,
            done_tx.clone(),
        )),
        tokio::spawn(keepalive(Arc::clone(&client_sink), done_tx)),
    ];

    // Only the first signal is consulted; the others abort mid-flight.
    if let Some(end) = done_rx.recv().await {
        debug!(%connection_id, ?end, "relay task finished");
    }
    for task in &tasks {
        task.abort();
    }

    info!(%connection_id, "relay session closed");
}

async fn pump_backend_to_client(
    mut backend: SplitStream<BackendSocket>,
    client: Arc<Mutex<ClientSink>>,
    done: mpsc::Sender<SessionEnd>,
) {
    let end = loop {
        match backend.next().await {
            Some(Ok(msg)) => {
                let Some(frame) = backend_frame_to_client(msg) else {
                    continue;
                };
                let closing = matches!(frame, Message::Close(_));
                let mut sink = client.lock().await;
                if let Err(err) = sink.send(frame).await {
                    break SessionEnd::ClientWrite(err.to_string());
                }
                drop(sink);
                if closing {
                    break SessionEnd::BackendEof;
                }
            }
            Some(Err(err)) => break SessionEnd::BackendRead(err.to_string()),
            None => break SessionEnd::BackendEof,
        }
    };
    let _ = done.send(end).await;
}

async fn pump_client_to_backend(
    mut client: SplitStream<WebSocket>,
    mut backend: SplitSink<BackendSocket, BackendMessage>,
    done: mpsc::Sender<SessionEnd>,
) {
    let end = loop {
        match client.next().await {
            Some(Ok(msg)) => {
                let frame = client_frame_to_backend(msg);
                let closing = matches!(frame, BackendMessage::Close(_));
                if let Err(err) = backend.send(frame).await {
                    break SessionEnd::BackendWrite(err.to_string());
                }
                if closing {
                    break SessionEnd::ClientEof;
                }
            }
            Some(Err(err)) => break SessionEnd::ClientRead(err.to_string()),
            None => break SessionEnd::ClientEof,
        }
    };
    let _ = done.send(end).await;
}

/// Ping the client on a fixed cadence so load balancers and other
/// middleboxes between us and the browser keep the connection alive.
async fn keepalive(client: Arc<Mutex<ClientSink>>, done: mpsc::Sender<SessionEnd>) {
    let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
    // The first tick completes immediately; the cadence starts one full
    // interval after the session opens.
    ticker.tick().await;

    let end = loop {
        ticker.tick().await;

        let mut sink = client.lock().await;
        let send = sink.send(Message::Ping(Bytes::new()));
        match tokio::time::timeout(CLIENT_WRITE_TIMEOUT, send).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => break SessionEnd::PingFailed(err.to_string()),
            Err(_) => break SessionEnd::PingFailed("write deadline exceeded".to_string()),
        }
    };
    let _ = done.send(end).await;
}

/// Map a backend frame onto the client connection, preserving the frame
/// type exactly. Raw frames never surface from a read.
fn backend_frame_to_client(msg: BackendMessage) -> Option<Message> {
    match msg {
        BackendMessage::Text(text) => Some(Message::Text(text.as_str().into())),
        BackendMessage::Binary(data) => Some(Message::Binary(data)),
        BackendMessage::Ping(data) => Some(Message::Ping(data)),
        BackendMessage::Pong(data) => Some(Message::Pong(data)),
        BackendMessage::Close(frame) => Some(Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        }))),
        BackendMessage::Frame(_) => None,
    }
}

/// Map a client frame onto the backend connection, preserving the frame
/// type exactly.
fn client_frame_to_backend(msg: Message) -> BackendMessage {
    match msg {
        Message::Text(text) => BackendMessage::Text(text.as_str().into()),
        Message::Binary(data) => BackendMessage::Binary(data),
        Message::Ping(data) => BackendMessage::Ping(data),
        Message::Pong(data) => BackendMessage::Pong(data),
        Message::Close(frame) => {
            BackendMessage::Close(frame.map(|f| tungstenite::protocol::CloseFrame {
                code: f.code.into(),
                reason: f.reason.as_str().into(),
            }))
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let mut response = (status, message.to_string()).into_response();
    apply_csp(response.headers_mut());
    response
}

/// Block scripts from running in relayed content, old browsers included.
fn apply_csp(headers: &mut HeaderMap) {
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("sandbox;"),
    );
    headers.insert(
        HeaderName::from_static("x-content-security-policy"),
        HeaderValue::from_static("sandbox;"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- frame mapping --

    #[test]
    fn text_frames_map_both_ways() {
        let from_backend = backend_frame_to_client(BackendMessage::Text("hi".into())).unwrap();
        assert!(matches!(from_backend, Message::Text(ref t) if t.as_str() == "hi"));

        let to_backend = client_frame_to_backend(Message::Text("yo".into()));
        assert!(matches!(to_backend, BackendMessage::Text(ref t) if t.as_str() == "yo"));
    }

    #[test]
    fn binary_frames_keep_their_bytes() {
        let payload = Bytes::from_static(b"\x00\x01\x02");
        let mapped = backend_frame_to_client(BackendMessage::Binary(payload.clone())).unwrap();
        assert!(matches!(mapped, Message::Binary(ref b) if *b == payload));
    }

    #[test]
    fn control_frames_are_preserved_not_dropped() {
        assert!(matches!(
            backend_frame_to_client(BackendMessage::Ping(Bytes::new())),
            Some(Message::Ping(_))
        ));
        assert!(matches!(
            backend_frame_to_client(BackendMessage::Pong(Bytes::new())),
            Some(Message::Pong(_))
        ));
        assert!(matches!(
            client_frame_to_backend(Message::Ping(Bytes::new())),
            BackendMessage::Ping(_)
        ));
    }

    #[test]
    fn close_frame_code_and_reason_survive() {
        let frame = tungstenite::protocol::CloseFrame {
            code: tungstenite::protocol::frame::coding::CloseCode::Away,
            reason: "moving on".into(),
        };
        let mapped = backend_frame_to_client(BackendMessage::Close(Some(frame))).unwrap();
        match mapped {
            Message::Close(Some(close)) => {
                assert_eq!(close.code, 1001);
                assert_eq!(close.reason.as_str(), "moving on");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[test]
    fn close_without_frame_maps_to_none() {
        assert!(matches!(
            backend_frame_to_client(BackendMessage::Close(None)),
            Some(Message::Close(None))
        ));
    }

    // -- error responses --

    #[test]
    fn error_responses_carry_csp_headers() {
        let response = error_response(StatusCode::BAD_GATEWAY, "nope");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_SECURITY_POLICY)
                .unwrap(),
            "sandbox;"
        );
        assert_eq!(
            response.headers().get("x-content-security-policy").unwrap(),
            "sandbox;"
        );
    }
}
