use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.coordinator.subscribe();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let notification = match rx.recv().await {
                Ok(notification) => notification,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging; notifications dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&notification) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize notification for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    until_either_finishes(send_task, recv_task).await;

    info!("websocket client disconnected");
}

/// Waits for the first task to finish and aborts the other.
async fn until_either_finishes(mut a: JoinHandle<()>, mut b: JoinHandle<()>) {
    tokio::select! {
        _ = &mut a => b.abort(),
        _ = &mut b => a.abort(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::until_either_finishes;

    #[tokio::test]
    async fn remaining_task_is_aborted() {
        let (guard_tx, guard_rx) = oneshot::channel::<()>();

        let finished = tokio::spawn(async {});
        let stuck = tokio::spawn(async move {
            let _guard = guard_tx;
            std::future::pending::<()>().await;
        });

        until_either_finishes(stuck, finished).await;

        // The sender is dropped only once the stuck task is torn down.
        assert!(guard_rx.await.is_err());
    }
}
