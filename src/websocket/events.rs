//! Wire format for the real-time gateway. Every frame is a JSON object
//! discriminated by a `type` tag; payload fields are camelCase to match the
//! REST surface.

use axum::extract::ws::Message as WsMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Frames a client may send on the socket. Unknown tags fail deserialization
/// and are answered with an `error` frame instead of closing the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinConversation {
        conversation_id: i64,
    },
    LeaveConversation {
        conversation_id: i64,
    },
    SendMessage {
        conversation_id: i64,
        content: String,
        #[serde(default)]
        message_type: Option<String>,
        #[serde(default)]
        reply_to_id: Option<i64>,
        /// Client-generated correlation id, echoed back on the resulting
        /// `new_message` frame so optimistic entries can be reconciled.
        #[serde(default)]
        client_id: Option<Uuid>,
    },
    Typing {
        conversation_id: i64,
        is_typing: bool,
    },
    MarkRead {
        conversation_id: i64,
        #[serde(default)]
        message_ids: Option<Vec<i64>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerEvent {
    JoinedConversation {
        conversation_id: i64,
    },
    NewMessage {
        conversation_id: i64,
        message: Message,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<Uuid>,
    },
    UserTyping {
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    MessagesRead {
        conversation_id: i64,
        user_id: i64,
        message_ids: Vec<i64>,
    },
    UserStatusChange {
        user_id: i64,
        status: PresenceStatus,
        timestamp: DateTime<Utc>,
    },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<Uuid>,
    },
}

impl ServerEvent {
    /// Serialize into a websocket text frame. Serialization of these enums
    /// cannot fail, so a failure is reported as an error frame.
    pub fn to_message(&self) -> WsMessage {
        match serde_json::to_string(self) {
            Ok(json) => WsMessage::Text(json),
            Err(err) => WsMessage::Text(format!(
                r#"{{"type":"error","code":"INTERNAL_ERROR","message":"serialization failed: {err}"}}"#
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_send_message_parses_with_correlation_id() {
        let frame = json!({
            "type": "send_message",
            "conversationId": 5,
            "content": "hello",
            "clientId": "8c0f29ed-97cd-4f5e-a2d0-2f8a3a9a64d1"
        });
        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        match event {
            ClientEvent::SendMessage {
                conversation_id,
                content,
                client_id,
                ..
            } => {
                assert_eq!(conversation_id, 5);
                assert_eq!(content, "hello");
                assert!(client_id.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let frame = json!({"type": "subscribe", "conversationId": 1});
        assert!(serde_json::from_value::<ClientEvent>(frame).is_err());
    }

    #[test]
    fn typing_event_wire_shape() {
        let event = ServerEvent::UserTyping {
            conversation_id: 3,
            user_id: 9,
            is_typing: true,
        };
        let json: serde_json::Value =
            serde_json::from_str(match &event.to_message() {
                WsMessage::Text(text) => text,
                _ => unreachable!(),
            })
            .unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["conversationId"], 3);
        assert_eq!(json["userId"], 9);
        assert_eq!(json["isTyping"], true);
    }

    #[test]
    fn presence_event_carries_status_and_timestamp() {
        let event = ServerEvent::UserStatusChange {
            user_id: 4,
            status: PresenceStatus::Offline,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_status_change");
        assert_eq!(json["status"], "offline");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn join_acknowledgement_wire_shape() {
        let event = ServerEvent::JoinedConversation { conversation_id: 8 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "joined_conversation");
        assert_eq!(json["conversationId"], 8);
    }

    #[test]
    fn error_frame_omits_absent_correlation_id() {
        let event = ServerEvent::Error {
            code: "VALIDATION_ERROR".to_string(),
            message: "bad frame".to_string(),
            client_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json.get("clientId").is_none());
    }

    #[test]
    fn mark_read_without_ids_means_whole_conversation() {
        let frame = json!({"type": "mark_read", "conversationId": 2});
        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        match event {
            ClientEvent::MarkRead {
                conversation_id,
                message_ids,
            } => {
                assert_eq!(conversation_id, 2);
                assert!(message_ids.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
