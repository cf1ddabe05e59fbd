use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppResult;
use crate::middleware::guards::{AuthUser, Moderator};
use crate::models::{Conversation, ConversationType, ConversationView, Participant};
use crate::routes::envelope::ApiEnvelope;
use crate::services::conversation_service::{ConversationFilters, ConversationService};
use crate::services::message_service::MessageService;
use crate::services::participant_service::ParticipantService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub conversation_type: Option<String>,
    pub role: Option<String>,
    pub archived: Option<bool>,
    pub favorites: Option<bool>,
    pub flagged: Option<bool>,
    pub search: Option<String>,
}

/// GET /conversations — the caller's conversations, filterable.
#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    params(ListQuery),
    responses((status = 200, description = "Caller's conversations")),
    tag = "conversations"
)]
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Vec<ConversationView>>>)> {
    let filters = ConversationFilters {
        conversation_type: query.conversation_type.as_deref().map(ConversationType::from_str),
        role: query.role,
        archived: query.archived,
        favorites: query.favorites,
        flagged: query.flagged,
        search: query.search,
    };

    let views = ConversationService::list_for_user(&state.db, user.id, &filters).await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "conversations retrieved",
        views,
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DirectQuery {
    pub project_id: Option<i64>,
}

/// GET /conversations/direct/:other_user_id — get or create the direct
/// conversation with another user.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/direct/{otherUserId}",
    params(DirectQuery),
    responses((status = 200, description = "The direct conversation")),
    tag = "conversations"
)]
pub async fn get_or_create_direct(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other_user_id): Path<i64>,
    Query(query): Query<DirectQuery>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Conversation>>)> {
    let conversation =
        ConversationService::get_or_create_direct(&state.db, user.id, other_user_id, query.project_id)
            .await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "direct conversation ready",
        conversation,
    ))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub project_id: Option<i64>,
    #[serde(default)]
    pub participant_ids: Vec<i64>,
    pub creator_role: Option<String>,
}

/// POST /conversations/group — create a group with invited members.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/group",
    request_body = CreateGroupRequest,
    responses((status = 201, description = "Group created")),
    tag = "conversations"
)]
pub async fn create_group(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Conversation>>)> {
    let conversation = ConversationService::create_group(
        &state.db,
        &body.name,
        body.project_id,
        user.id,
        body.creator_role.as_deref(),
        &body.participant_ids,
    )
    .await?;
    Ok(ApiEnvelope::success(
        StatusCode::CREATED,
        "group conversation created",
        conversation,
    ))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub message_ids: Option<Vec<i64>>,
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub read_message_ids: Vec<i64>,
}

/// POST /conversations/:id/read — mark messages read and broadcast the
/// receipt to the conversation room.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/read",
    request_body = MarkReadRequest,
    responses((status = 200, description = "Messages marked read")),
    tag = "conversations"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(body): Json<MarkReadRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<MarkReadResponse>>)> {
    crate::middleware::guards::ConversationAccess::verify(&state.db, user.id, conversation_id)
        .await?;

    let read_message_ids = MessageService::mark_read(
        &state.db,
        conversation_id,
        user.id,
        body.message_ids.as_deref(),
    )
    .await?;

    if !read_message_ids.is_empty() {
        let event = ServerEvent::MessagesRead {
            conversation_id,
            user_id: user.id,
            message_ids: read_message_ids.clone(),
        };
        state
            .registry
            .broadcast_room(conversation_id, event.to_message())
            .await;
    }

    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "messages marked read",
        MarkReadResponse { read_message_ids },
    ))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParticipantRequest {
    pub is_archived: Option<bool>,
    pub is_favorite: Option<bool>,
    pub is_muted: Option<bool>,
}

/// PUT /conversations/:id/participant — update the caller's own view flags.
#[utoipa::path(
    put,
    path = "/api/v1/conversations/{id}/participant",
    request_body = UpdateParticipantRequest,
    responses((status = 200, description = "Participant updated")),
    tag = "conversations"
)]
pub async fn update_participant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(body): Json<UpdateParticipantRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Participant>>)> {
    let participant = ParticipantService::update_view_flags(
        &state.db,
        conversation_id,
        user.id,
        body.is_archived,
        body.is_favorite,
        body.is_muted,
    )
    .await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "participant updated",
        participant,
    ))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlagRequest {
    pub reason: String,
}

/// POST /conversations/:id/flag — moderator flags a conversation.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/flag",
    request_body = FlagRequest,
    responses((status = 200, description = "Conversation flagged")),
    tag = "moderation"
)]
pub async fn flag(
    State(state): State<AppState>,
    moderator: Moderator,
    Path(conversation_id): Path<i64>,
    Json(body): Json<FlagRequest>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Conversation>>)> {
    let conversation =
        ConversationService::flag(&state.db, conversation_id, moderator.user.id, &body.reason)
            .await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "conversation flagged",
        conversation,
    ))
}

/// DELETE /conversations/:id/flag — moderator clears the flag.
#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{id}/flag",
    responses((status = 200, description = "Conversation unflagged")),
    tag = "moderation"
)]
pub async fn unflag(
    State(state): State<AppState>,
    _moderator: Moderator,
    Path(conversation_id): Path<i64>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<Conversation>>)> {
    let conversation = ConversationService::unflag(&state.db, conversation_id).await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "conversation unflagged",
        conversation,
    ))
}

/// DELETE /conversations/:id — moderator soft-deletes a conversation.
#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{id}",
    responses((status = 200, description = "Conversation deleted")),
    tag = "moderation"
)]
pub async fn soft_delete(
    State(state): State<AppState>,
    _moderator: Moderator,
    Path(conversation_id): Path<i64>,
) -> AppResult<(StatusCode, Json<ApiEnvelope<()>>)> {
    ConversationService::soft_delete(&state.db, conversation_id).await?;
    Ok(ApiEnvelope::success(
        StatusCode::OK,
        "conversation deleted",
        (),
    ))
}
