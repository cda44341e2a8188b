use crate::capacity_logic::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forwards every published `CapacityEvent` to the client as a JSON text
/// frame. Client frames other than close are ignored.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    let mut subscription = state.dispatcher.subscribe(&format!("ws-client-{}", client_id));
    let (mut sender, mut receiver) = socket.split();
    info!(client_id, "Event client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(client_id, error = %e, "Event client read failed");
                        break;
                    }
                }
            }
            event = subscription.recv() => {
                let Some(event) = event else {
                    warn!(client_id, "Event subscription closed by dispatcher");
                    break;
                };
                let payload = match serde_json::to_string(event.as_ref()) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(client_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.dispatcher.unsubscribe(subscription.id());
    info!(client_id, "Event client disconnected");
}
