use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::error::AppError;
use crate::registry::ConnectionHandle;
use crate::router::MessageRouter;
use crate::server::AppState;

use super::message::InboundMessage;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The credential is verified before the upgrade;
/// a connection that fails here never touches the registry.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    // Extract credential from query parameter or Authorization header
    let token = match extract_token(&query, &headers) {
        Some(t) => t,
        None => {
            return (StatusCode::UNAUTHORIZED, "Missing authentication token").into_response();
        }
    };

    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Credential verification failed");
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    tracing::info!(identity = %identity, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Extract the bearer credential from the query string or the
/// Authorization header, in that order
fn extract_token(query: &WsQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(ref token) = query.token {
        return Some(token.clone());
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Drive one established connection end-to-end: register, relay, deregister.
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state),
    fields(identity = %identity)
)]
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection_start = Instant::now();

    // Bounded outbound queue; the router drops on overflow rather than wait
    let (tx, mut rx) = mpsc::channel::<String>(state.settings.relay.outbound_capacity);
    let handle = Arc::new(ConnectionHandle::new(identity.clone(), tx));
    let connection_id = handle.id;

    // A prior registration under the same identity is superseded, not closed;
    // its session drains on its own and its unregister will no-op.
    state.registry.register(handle);

    tracing::info!(
        connection_id = %connection_id,
        identity = %identity,
        "WebSocket connection established"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer task: drain the outbound queue in FIFO order until the queue
    // closes or a write fails
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: decode each frame and route it until the transport
    // fails or the peer closes
    let router = state.router.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(frame) => {
                    if !process_frame(frame, &router) {
                        return Ok(());
                    }
                }
                Err(e) => return Err(AppError::Transport(e.to_string())),
            }
        }
        Ok(())
    });

    // Either task ending tears the whole session down
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        result = &mut recv_task => {
            if let Ok(Err(e)) = result {
                tracing::warn!(error = %e, "Session terminated by transport error");
            }
            send_task.abort();
        }
    }

    // Conditional on the connection id: a newer registration that reused
    // this identity stays untouched
    state.registry.unregister(&identity, connection_id);

    tracing::info!(
        connection_id = %connection_id,
        identity = %identity,
        duration_secs = connection_start.elapsed().as_secs_f64(),
        "WebSocket connection closed"
    );
}

/// Process a received frame. Returns false if the session should close.
fn process_frame(frame: Message, router: &MessageRouter) -> bool {
    match frame {
        Message::Text(text) => {
            match serde_json::from_str::<InboundMessage>(&text) {
                Ok(msg) => router.route(msg),
                Err(e) => {
                    // A single undecodable frame is dropped, not fatal
                    tracing::warn!(error = %AppError::Decode(e), "Discarding malformed frame");
                }
            }
            true
        }
        Message::Binary(_) => {
            tracing::warn!("Discarding binary frame");
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => false,
    }
}
