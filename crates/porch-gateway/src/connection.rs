use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use porch_social::conversation::ConversationLog;
use porch_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::run_blocking;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MISSED_PONG_LIMIT: u8 = 2;

/// Drive one authenticated WebSocket until either side hangs up.
///
/// The token was checked at the HTTP upgrade, so the loop starts with
/// `Ready`, then the current presence snapshot, then registers the
/// connection so live pushes can reach it.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    conversations: ConversationLog,
    user_id: Uuid,
) {
    let (mut sender, receiver) = socket.split();

    info!("{} connected to gateway", user_id);

    if send_event(&mut sender, &GatewayEvent::Ready { user_id }).await.is_err() {
        return;
    }

    let registry = dispatcher.registry().clone();
    let (online, presence_rx) = registry.watch_presence();
    for uid in online {
        let event = GatewayEvent::PresenceUpdate {
            user_id: uid,
            online: true,
        };
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    let conn_id = Uuid::new_v4();
    let (tx, user_rx) = mpsc::unbounded_channel();
    registry.register(user_id, conn_id, tx.clone());

    let pong_received = Arc::new(AtomicBool::new(true));

    let mut send_task = tokio::spawn(send_loop(
        sender,
        presence_rx,
        user_rx,
        pong_received.clone(),
    ));

    let mut recv_task = tokio::spawn(async move {
        recv_loop(receiver, dispatcher, conversations, user_id, tx, pong_received).await;
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(conn_id);
    info!("{} disconnected from gateway", user_id);
}

/// Forward presence and targeted events to the client, with heartbeat.
async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut presence_rx: broadcast::Receiver<GatewayEvent>,
    mut user_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    pong_received: Arc<AtomicBool>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            result = presence_rx.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Presence receiver lagged by {} events", n);
                        continue;
                    }
                    Err(_) => break,
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            result = user_rx.recv() => {
                let Some(event) = result else { break };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MISSED_PONG_LIMIT {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn recv_loop(
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    conversations: ConversationLog,
    user_id: Uuid,
    reply: mpsc::UnboundedSender<GatewayEvent>,
    pong_received: Arc<AtomicBool>,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                Ok(cmd) => {
                    handle_command(&dispatcher, &conversations, user_id, cmd, &reply).await;
                }
                Err(e) => {
                    warn!(
                        "{} bad command: {} -- raw: {}",
                        user_id,
                        e,
                        text.chars().take(200).collect::<String>()
                    );
                    let _ = reply.send(GatewayEvent::Error {
                        message: format!("bad command: {}", e),
                    });
                }
            },
            Message::Pong(_) => {
                pong_received.store(true, Ordering::Release);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Execute one client command. Replies go back through this connection's
/// own queue so they interleave correctly with live pushes.
pub async fn handle_command(
    dispatcher: &Dispatcher,
    conversations: &ConversationLog,
    user_id: Uuid,
    cmd: GatewayCommand,
    reply: &mpsc::UnboundedSender<GatewayEvent>,
) {
    let outcome = match cmd {
        GatewayCommand::SendMessage { to, text, nonce } => {
            let log = conversations.clone();
            let key = nonce.clone();
            run_blocking(move || log.append(user_id, to, &text, key.as_deref()))
                .await
                .map(|message| vec![GatewayEvent::MessageAck { nonce, message }])
        }

        GatewayCommand::SyncThread { with_user, after } => {
            let log = conversations.clone();
            run_blocking(move || log.thread(user_id, with_user, after))
                .await
                .map(|messages| {
                    debug!("{} synced {} messages with {}", user_id, messages.len(), with_user);
                    messages
                        .into_iter()
                        .map(|message| GatewayEvent::MessageCreate { message })
                        .collect()
                })
        }

        GatewayCommand::StartTyping { to } => {
            if to != user_id {
                dispatcher.push(to, GatewayEvent::TypingStart { from_user_id: user_id });
            }
            Ok(vec![])
        }

        GatewayCommand::MarkRead { with_user } => {
            let log = conversations.clone();
            run_blocking(move || log.mark_read(user_id, with_user))
                .await
                .map(|updated| {
                    debug!("{} marked {} messages from {} read", user_id, updated, with_user);
                    vec![]
                })
        }
    };

    let events = outcome.unwrap_or_else(|e| {
        warn!("{} command failed: {}", user_id, e);
        vec![GatewayEvent::Error {
            message: e.to_string(),
        }]
    });
    for event in events {
        // The send loop has gone; the select in handle_connection will finish us too
        if reply.send(event).is_err() {
            break;
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
