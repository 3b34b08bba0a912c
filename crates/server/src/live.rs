//! WebSocket upgrade for the fixed `"all"` room (§4.8, §6 "Push channel
//! only accepts joining the fixed room `all`"), grounded on the teacher's
//! `live.rs` broadcast-channel fan-out pattern: one `broadcast::Sender`
//! shared by `AppState`, one receiver per connected socket.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::state::{AppState, ROOM_ALL};

#[derive(Deserialize)]
pub struct JoinParams {
    room: Option<String>,
}

#[derive(Serialize)]
struct WsMessage<T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    data: T,
}

fn ws_json<T: Serialize>(msg_type: &'static str, data: T) -> String {
    serde_json::to_string(&WsMessage { msg_type, data }).unwrap_or_default()
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, params, state))
}

async fn handle_ws(socket: WebSocket, params: JoinParams, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    if let Some(room) = &params.room {
        if room != ROOM_ALL {
            let _ = sender
                .send(Message::Text(ws_json("error", serde_json::json!({"message": format!("unknown room '{room}'")})).into()))
                .await;
            let _ = sender.close().await;
            return;
        }
    }

    let mut rx = state.broadcast.subscribe();
    state.socket_count.fetch_add(1, Ordering::Relaxed);

    let joined = ws_json("joined", serde_json::json!({"room": ROOM_ALL}));
    if sender.send(Message::Text(joined.into())).await.is_err() {
        state.socket_count.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.socket_count.fetch_sub(1, Ordering::Relaxed);
}

/// Serializes an accepted filing as the payload pushed to room `"all"`.
pub fn filing_message(filing: &pipeline_core::StoredFiling) -> String {
    ws_json("filing", filing)
}
