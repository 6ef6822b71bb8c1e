//! Domain entities returned by the Beeper Desktop API and the envelopes they travel in.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A chat (conversation) on any network bridged by Beeper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    /// Opaque chat identifier.
    pub id: String,

    /// Display name; may be empty for some chats.
    #[serde(default)]
    pub name: String,

    /// Participant names, in the order the API reports them.
    #[serde(default)]
    pub participants: Vec<String>,

    /// Number of unread messages.
    #[serde(rename = "unreadCount", default)]
    pub unread_count: i64,

    /// Preview of the most recent message.
    #[serde(rename = "lastMessage", default)]
    pub last_message: String,

    /// Time of the most recent activity.
    #[serde(
        rename = "updatedAt",
        with = "crate::utils::time",
        default = "unix_epoch"
    )]
    pub updated_at: OffsetDateTime,
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// A single message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Opaque message identifier.
    pub id: String,

    /// Message body.
    #[serde(default)]
    pub text: String,

    /// Sender display name.
    #[serde(default)]
    pub sender: String,

    /// Send time in seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// The outcome of sending a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResult {
    /// Identifier the API assigned to the new message.
    #[serde(rename = "messageID")]
    pub message_id: String,

    /// Whether the API accepted the message.
    pub success: bool,
}

/// Envelope for the chat and message listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    /// The page of entities.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    /// Whether further pages exist.
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}

/// Body of `POST /v1/chats/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    /// The message body.
    pub text: &'a str,
}

/// Response of `POST /v1/chats/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    /// Identifier of the created message.
    pub id: String,
}

impl From<SendMessageResponse> for SendResult {
    fn from(resp: SendMessageResponse) -> Self {
        SendResult {
            success: !resp.id.is_empty(),
            message_id: resp.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn chat_wire_names() {
        let json = r#"{
            "id": "!abc:beeper.com",
            "name": "Family",
            "participants": ["Ann", "Bo"],
            "unreadCount": 3,
            "lastMessage": "see you",
            "updatedAt": "2024-05-01T12:00:00Z"
        }"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert_eq!(chat.id, "!abc:beeper.com");
        assert_eq!(chat.participants, vec!["Ann", "Bo"]);
        assert_eq!(chat.unread_count, 3);
        assert_eq!(chat.updated_at, datetime!(2024-05-01 12:00:00 UTC));

        let value = serde_json::to_value(&chat).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "name",
                "participants",
                "unreadCount",
                "lastMessage",
                "updatedAt"
            ]
        );
    }

    #[test]
    fn sparse_chat_uses_defaults() {
        let chat: Chat = serde_json::from_str(r#"{"id":"c1"}"#).unwrap();
        assert!(chat.name.is_empty());
        assert!(chat.participants.is_empty());
        assert_eq!(chat.updated_at, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn list_envelope() {
        let resp: ListResponse<Message> = serde_json::from_str(
            r#"{"items":[{"id":"m1","text":"hi","sender":"Ann","timestamp":1700000000}],"hasMore":true}"#,
        )
        .unwrap();
        assert_eq!(resp.items.len(), 1);
        assert!(resp.has_more);

        let resp: ListResponse<Message> = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(!resp.has_more);
    }

    #[test]
    fn send_response_maps_to_result() {
        let result = SendResult::from(SendMessageResponse { id: "m9".into() });
        assert_eq!(result.message_id, "m9");
        assert!(result.success);
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"messageID":"m9","success":true}"#
        );
    }
}
