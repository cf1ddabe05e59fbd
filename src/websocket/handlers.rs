//! Socket lifecycle and event dispatch for the real-time gateway.
//!
//! Each connection runs one task: a `select!` loop that forwards registry
//! pushes to the socket and dispatches parsed client frames. All outbound
//! writes go through the registry channel, so the sink has a single writer.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::Identity;
use crate::models::MessageType;
use crate::services::message_service::MessageService;
use crate::services::participant_service::ParticipantService;
use crate::state::AppState;
use crate::websocket::events::{ClientEvent, PresenceStatus, ServerEvent};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let user_id = identity.id;
    let (mut sink, mut stream) = socket.split();

    let (conn_id, mut rx) = state.registry.register(user_id).await;
    info!(user_id, %conn_id, "websocket connected");

    let online = ServerEvent::UserStatusChange {
        user_id,
        status: PresenceStatus::Online,
        timestamp: chrono::Utc::now(),
    };
    state.registry.broadcast_all(online.to_message()).await;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    // Channel closed: a newer connection displaced this one
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(&state, user_id, &text).await;
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if sink.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary and pong frames are ignored
                    Some(Err(err)) => {
                        debug!(user_id, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    // Only the authoritative connection tears down presence; a displaced
    // task exiting late must not mark the reconnected user offline.
    if state.registry.unregister(user_id, conn_id).await {
        let offline = ServerEvent::UserStatusChange {
            user_id,
            status: PresenceStatus::Offline,
            timestamp: chrono::Utc::now(),
        };
        state.registry.broadcast_all(offline.to_message()).await;
    }
    info!(user_id, %conn_id, "websocket disconnected");
}

/// Parse and dispatch one client frame. Failures are answered with an
/// `error` frame on the caller's own connection; the socket stays open.
pub async fn handle_frame(state: &AppState, user_id: i64, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            let err = AppError::Validation(format!("malformed frame: {err}"));
            send_error(state, user_id, &err, None).await;
            return;
        }
    };

    if let Err((err, client_id)) = dispatch(state, user_id, event).await {
        send_error(state, user_id, &err, client_id).await;
    }
}

async fn dispatch(
    state: &AppState,
    user_id: i64,
    event: ClientEvent,
) -> Result<(), (AppError, Option<Uuid>)> {
    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            require_membership(state, conversation_id, user_id, None).await?;
            state.registry.join_room(conversation_id, user_id).await;
            debug!(user_id, conversation_id, "joined room");
            let ack = ServerEvent::JoinedConversation { conversation_id };
            state.registry.send_to_user(user_id, ack.to_message()).await;
            Ok(())
        }

        ClientEvent::LeaveConversation { conversation_id } => {
            state.registry.leave_room(conversation_id, user_id).await;
            Ok(())
        }

        ClientEvent::SendMessage {
            conversation_id,
            content,
            message_type,
            reply_to_id,
            client_id,
        } => {
            require_membership(state, conversation_id, user_id, client_id).await?;

            let message_type = message_type
                .as_deref()
                .map(MessageType::from_str)
                .unwrap_or(MessageType::Text);

            let message = MessageService::create(
                &state.db,
                conversation_id,
                user_id,
                &content,
                message_type,
                reply_to_id,
                None,
            )
            .await
            .map_err(|err| (err, client_id))?;

            let event = ServerEvent::NewMessage {
                conversation_id,
                message,
                client_id,
            };
            state
                .registry
                .broadcast_room(conversation_id, event.to_message())
                .await;
            Ok(())
        }

        ClientEvent::Typing {
            conversation_id,
            is_typing,
        } => {
            if is_typing {
                state.typing.start(conversation_id, user_id);
            } else if !state.typing.stop(conversation_id, user_id) {
                // Nothing was tracked; suppress the redundant broadcast
                return Ok(());
            }
            let event = ServerEvent::UserTyping {
                conversation_id,
                user_id,
                is_typing,
            };
            state
                .registry
                .broadcast_room(conversation_id, event.to_message())
                .await;
            Ok(())
        }

        ClientEvent::MarkRead {
            conversation_id,
            message_ids,
        } => {
            require_membership(state, conversation_id, user_id, None).await?;
            let read_ids = MessageService::mark_read(
                &state.db,
                conversation_id,
                user_id,
                message_ids.as_deref(),
            )
            .await
            .map_err(|err| (err, None))?;
            if read_ids.is_empty() {
                return Ok(());
            }
            let event = ServerEvent::MessagesRead {
                conversation_id,
                user_id,
                message_ids: read_ids,
            };
            state
                .registry
                .broadcast_room(conversation_id, event.to_message())
                .await;
            Ok(())
        }
    }
}

async fn require_membership(
    state: &AppState,
    conversation_id: i64,
    user_id: i64,
    client_id: Option<Uuid>,
) -> Result<(), (AppError, Option<Uuid>)> {
    let member = ParticipantService::is_active_participant(&state.db, conversation_id, user_id)
        .await
        .map_err(|err| (err, client_id))?;
    if !member {
        return Err((
            AppError::Forbidden("not a participant of this conversation".into()),
            client_id,
        ));
    }
    Ok(())
}

async fn send_error(state: &AppState, user_id: i64, err: &AppError, client_id: Option<Uuid>) {
    let event = ServerEvent::Error {
        code: err.code().to_string(),
        message: err.public_message(),
        client_id,
    };
    if !state.registry.send_to_user(user_id, event.to_message()).await {
        warn!(user_id, "dropping error frame for disconnected user");
    }
}
