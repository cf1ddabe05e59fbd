use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::{AuthUser, ConversationAccess};
use crate::models::message::FileMeta;
use crate::models::{Message, MessageType};
use crate::routes::envelope::ApiEnvelope;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: i64,
    pub content: String,
    pub message_type: Option<String>,
    pub reply_to_id: Option<i64>,
    /// Metadata for file/image/audio messages, uploaded out of band.
    pub file: Option<FileMeta>,
    /// Correlation id echoed back on the push so the sender's client can
    /// reconcile its optimistic entry.
    pub client_id: Option<Uuid>,
}

/// POST /messages — send a message over the REST path. Used directly and as
/// the fallback when the live socket is down; either way the result is
/// fanned out to the conversation room.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message created"),
        (status = 403, description = "Not a participant, or conversation is flagged")
    ),
    tag = "messages"
)]
pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Message>>)> {
    let access = ConversationAccess::verify(&state.db, user.id, body.conversation_id).await?;
    access.can_write(user.moderator)?;

    let message_type = body
        .message_type
        .as_deref()
        .map(MessageType::from_str)
        .unwrap_or(MessageType::Text);

    let message = MessageService::create(
        &state.db,
        body.conversation_id,
        user.id,
        &body.content,
        message_type,
        body.reply_to_id,
        body.file.as_ref(),
    )
    .await?;

    let event = ServerEvent::NewMessage {
        conversation_id: body.conversation_id,
        message: message.clone(),
        client_id: body.client_id,
    };
    state
        .registry
        .broadcast_room(body.conversation_id, event.to_message())
        .await;

    Ok(ApiEnvelope::success(
        StatusCode::CREATED,
        "message sent",
        message,
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /conversations/:id/messages — paginated history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    params(HistoryQuery),
    responses((status = 200, description = "Message page")),
    tag = "messages"
)]
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Vec<Message>>>)> {
    ConversationAccess::verify(&state.db, user.id, conversation_id).await?;

    let limit = query
        .limit
        .unwrap_or(50)
        .min(state.config.history_max_limit);
    let messages =
        MessageService::list(&state.db, conversation_id, limit, query.offset.unwrap_or(0)).await?;

    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "messages retrieved",
        messages,
    ))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub content: String,
}

/// PUT /messages/:id — edit own message.
#[utoipa::path(
    put,
    path = "/api/v1/messages/{id}",
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Message edited"),
        (status = 404, description = "Not found or not the sender")
    ),
    tag = "messages"
)]
pub async fn edit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<i64>,
    Json(body): Json<EditMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Message>>)> {
    let message = MessageService::edit(&state.db, message_id, user.id, &body.content)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "message edited",
        message,
    ))
}

/// DELETE /messages/:id — soft-delete own message.
#[utoipa::path(
    delete,
    path = "/api/v1/messages/{id}",
    responses(
        (status = 200, description = "Message deleted"),
        (status = 404, description = "Not found or not the sender")
    ),
    tag = "messages"
)]
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<i64>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Message>>)> {
    let message = MessageService::soft_delete(&state.db, message_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "message deleted",
        message,
    ))
}
