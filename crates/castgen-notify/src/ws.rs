//! WebSocket progress endpoint with backpressure.
//!
//! A client connects, sends a `subscribe` message naming the jobs it cares
//! about, and receives every matching `JobEvent`. Sends go through a bounded
//! buffer so one slow client backs up only its own connection, never the bus.

use std::collections::HashSet;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use castgen_models::{JobEvent, JobId, WsClientMessage};

use crate::EventBus;

const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const WS_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether an event should be forwarded to a connection with this filter.
fn matches_filter(filter: &HashSet<JobId>, event: &JobEvent) -> bool {
    filter.contains(&event.job_id)
}

/// Send an event with backpressure handling.
async fn send_event(tx: &mpsc::Sender<Message>, event: &JobEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(_) => return false,
    };
    match tx.try_send(Message::Text(json.clone())) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(Message::Text(json)).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// WebSocket upgrade endpoint for job progress.
pub async fn ws_progress(
    ws: WebSocketUpgrade,
    State(bus): State<EventBus>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_progress_socket(socket, bus))
}

async fn handle_progress_socket(socket: WebSocket, bus: EventBus) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded send buffer; a dedicated task drains it to the socket.
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // The first message must be a subscribe action.
    let mut filter: HashSet<JobId> =
        match tokio::time::timeout(WS_SUBSCRIBE_TIMEOUT, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text) {
                Ok(WsClientMessage::Subscribe { job_ids }) => job_ids.into_iter().collect(),
                Err(e) => {
                    warn!("Invalid subscribe message: {}", e);
                    let reply = serde_json::json!({
                        "type": "ERROR",
                        "data": { "error_message": "first message must be a subscribe action" },
                    });
                    let _ = tx.send(Message::Text(reply.to_string())).await;
                    drop(tx);
                    let _ = send_task.await;
                    return;
                }
            },
            _ => {
                debug!("Client never subscribed, closing");
                drop(tx);
                let _ = send_task.await;
                return;
            }
        };

    info!(jobs = filter.len(), "WebSocket progress subscription started");
    let mut events = bus.subscribe();
    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    let mut last_activity = std::time::Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !matches_filter(&filter, &event) {
                            continue;
                        }
                        last_activity = std::time::Instant::now();
                        if !send_event(&tx, &event).await {
                            warn!("WebSocket send failed, client disconnected");
                            break;
                        }
                    }
                    // Lagged receivers drop missed events; the client
                    // reconciles against the job store
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "WebSocket subscriber lagged behind event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > WS_HEARTBEAT_INTERVAL / 2 {
                    if tx.send(Message::Ping(vec![])).await.is_err() {
                        warn!("Heartbeat failed, client disconnected");
                        break;
                    }
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        // Subscriptions are additive over the connection
                        if let Ok(WsClientMessage::Subscribe { job_ids }) =
                            serde_json::from_str(&text)
                        {
                            filter.extend(job_ids);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = std::time::Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed progress connection");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(tx);
    let _ = send_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use castgen_models::{VideoId, VideoJob};

    #[test]
    fn test_filter_scopes_events_to_subscribed_jobs() {
        let subscribed = VideoJob::new(VideoId::new());
        let other = VideoJob::new(VideoId::new());
        let filter: HashSet<JobId> = [subscribed.id.clone()].into_iter().collect();

        assert!(matches_filter(&filter, &JobEvent::job_update(&subscribed)));
        assert!(!matches_filter(&filter, &JobEvent::job_update(&other)));
    }

    #[tokio::test]
    async fn test_send_event_reports_closed_channel() {
        let (tx, rx) = mpsc::channel::<Message>(1);
        let job = VideoJob::new(VideoId::new());
        let event = JobEvent::job_update(&job);

        assert!(send_event(&tx, &event).await);
        drop(rx);
        assert!(!send_event(&tx, &event).await);
    }
}
