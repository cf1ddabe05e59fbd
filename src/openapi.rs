use utoipa::OpenApi;

use crate::models::{
    Conversation, ConversationStatus, ConversationType, ConversationView, Message, MessageStatus,
    MessageType, Participant,
};
use crate::routes::conversations::{
    CreateGroupRequest, FlagRequest, MarkReadRequest, MarkReadResponse, UpdateParticipantRequest,
};
use crate::routes::messages::{EditMessageRequest, SendMessageRequest};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chat Service API",
        description = "Conversations, messages, read receipts and the real-time gateway"
    ),
    paths(
        crate::routes::conversations::list,
        crate::routes::conversations::get_or_create_direct,
        crate::routes::conversations::create_group,
        crate::routes::conversations::mark_read,
        crate::routes::conversations::update_participant,
        crate::routes::conversations::flag,
        crate::routes::conversations::unflag,
        crate::routes::conversations::soft_delete,
        crate::routes::messages::send,
        crate::routes::messages::history,
        crate::routes::messages::edit,
        crate::routes::messages::remove,
    ),
    components(schemas(
        Conversation,
        ConversationType,
        ConversationStatus,
        ConversationView,
        Participant,
        Message,
        MessageType,
        MessageStatus,
        crate::models::message::FileMeta,
        CreateGroupRequest,
        MarkReadRequest,
        MarkReadResponse,
        UpdateParticipantRequest,
        FlagRequest,
        SendMessageRequest,
        EditMessageRequest,
    )),
    tags(
        (name = "conversations", description = "Conversation directory and participant state"),
        (name = "messages", description = "Message log and history"),
        (name = "moderation", description = "Moderator-only conversation controls")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/messages"));
        assert!(doc.paths.paths.contains_key("/api/v1/conversations"));
    }
}
