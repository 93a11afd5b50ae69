use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use gitchat_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection. The session token was
/// validated at the HTTP upgrade layer, so the join is implicit: send Ready,
/// register presence and enter the event loop.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, username: String) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} connected to gateway", username);

    let ready = GatewayEvent::Ready {
        username: username.clone(),
    };
    let Ok(ready_json) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready_json.into())).await.is_err() {
        return;
    }

    // Subscribe before registering so this connection observes its own join
    // in the presence snapshot stream.
    let mut broadcast_rx = dispatcher.subscribe();
    let (conn_id, mut user_rx) = dispatcher.register(&username).await;

    let dispatcher_clone = dispatcher.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward snapshots + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_clone, &username_recv, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            username_recv,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(&username, conn_id).await;
    info!("{} disconnected from gateway", username);
}

/// Apply one client command. The REST layer has already persisted the
/// underlying change; commands only drive live delivery, scoped to the
/// conversation's other participant via presence lookup.
pub async fn handle_command(dispatcher: &Dispatcher, username: &str, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::SendMessage { message } => {
            let receiver = message.receiver.clone();
            let message_id = message.id;
            let delivered = dispatcher
                .send_to_user(&receiver, GatewayEvent::ReceiveMessage { message })
                .await;

            // Delivery ack goes back to the sender's own connection, and
            // only when the receiver was actually online.
            if delivered {
                dispatcher
                    .send_to_user(username, GatewayEvent::MessageDelivered { message_id })
                    .await;
            }
        }

        GatewayCommand::DeleteForEveryone {
            message_id,
            conversation_id,
            receiver,
        } => {
            info!("{} deleted message {} for everyone", username, message_id);
            dispatcher
                .send_to_user(
                    &receiver,
                    GatewayEvent::MessageDeleted {
                        message_id,
                        conversation_id,
                        deleted_by: username.to_string(),
                    },
                )
                .await;
        }

        GatewayCommand::Reaction {
            message_id,
            conversation_id,
            receiver,
            reaction,
        } => {
            dispatcher
                .send_to_user(
                    &receiver,
                    GatewayEvent::MessageReaction {
                        message_id,
                        conversation_id,
                        username: username.to_string(),
                        reaction,
                    },
                )
                .await;
        }

        GatewayCommand::Forward { receiver, message } => {
            let conversation_id = message.conversation_id;
            dispatcher
                .send_to_user(
                    &receiver,
                    GatewayEvent::MessageForwarded {
                        conversation_id,
                        sender: username.to_string(),
                        message,
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitchat_types::models::{Message as ChatMessage, MessageKind, Reaction};
    use uuid::Uuid;

    fn message(sender: &str, receiver: &str, body: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
            image_url: None,
            read: false,
            reply_to: None,
            forwarded_from: None,
            reactions: vec![],
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn online_receiver_gets_message_and_sender_gets_ack() {
        let dispatcher = Dispatcher::new();
        let (_ca, mut alice_rx) = dispatcher.register("alice").await;
        let (_cb, mut bob_rx) = dispatcher.register("bob").await;

        let msg = message("alice", "bob", "hello");
        let msg_id = msg.id;
        handle_command(&dispatcher, "alice", GatewayCommand::SendMessage { message: msg }).await;

        match bob_rx.try_recv().unwrap() {
            GatewayEvent::ReceiveMessage { message } => {
                assert_eq!(message.body, "hello");
                assert_eq!(message.sender, "alice");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match alice_rx.try_recv().unwrap() {
            GatewayEvent::MessageDelivered { message_id } => assert_eq!(message_id, msg_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn offline_receiver_means_no_ack() {
        let dispatcher = Dispatcher::new();
        let (_ca, mut alice_rx) = dispatcher.register("alice").await;

        let msg = message("alice", "bob", "anyone there?");
        handle_command(&dispatcher, "alice", GatewayCommand::SendMessage { message: msg }).await;

        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deletion_is_scoped_to_the_other_participant() {
        let dispatcher = Dispatcher::new();
        let (_cb, mut bob_rx) = dispatcher.register("bob").await;
        let (_cc, mut carol_rx) = dispatcher.register("carol").await;

        let message_id = Uuid::new_v4();
        handle_command(
            &dispatcher,
            "alice",
            GatewayCommand::DeleteForEveryone {
                message_id,
                conversation_id: Uuid::new_v4(),
                receiver: "bob".into(),
            },
        )
        .await;

        match bob_rx.try_recv().unwrap() {
            GatewayEvent::MessageDeleted {
                message_id: id,
                deleted_by,
                ..
            } => {
                assert_eq!(id, message_id);
                assert_eq!(deleted_by, "alice");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // Unrelated online users see nothing.
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reaction_reaches_only_the_receiver() {
        let dispatcher = Dispatcher::new();
        let (_cb, mut bob_rx) = dispatcher.register("bob").await;
        let (_cc, mut carol_rx) = dispatcher.register("carol").await;

        handle_command(
            &dispatcher,
            "alice",
            GatewayCommand::Reaction {
                message_id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                receiver: "bob".into(),
                reaction: Some(Reaction::Love),
            },
        )
        .await;

        match bob_rx.try_recv().unwrap() {
            GatewayEvent::MessageReaction {
                username, reaction, ..
            } => {
                assert_eq!(username, "alice");
                assert_eq!(reaction, Some(Reaction::Love));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forward_lands_on_the_forward_receiver() {
        let dispatcher = Dispatcher::new();
        let (_cb, mut bob_rx) = dispatcher.register("bob").await;

        let msg = message("alice", "bob", "forwarded content");
        handle_command(
            &dispatcher,
            "alice",
            GatewayCommand::Forward {
                receiver: "bob".into(),
                message: msg,
            },
        )
        .await;

        match bob_rx.try_recv().unwrap() {
            GatewayEvent::MessageForwarded { sender, message, .. } => {
                assert_eq!(sender, "alice");
                assert_eq!(message.body, "forwarded content");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
