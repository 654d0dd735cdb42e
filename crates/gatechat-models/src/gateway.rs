use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::presence::PresenceEntry;

/// Inbound events a connected client may send. Closed set; anything that
/// fails to parse into one of these is rejected with `ErrorCode::Invalid`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "identify")]
    Identify {
        name: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    #[serde(rename = "send")]
    Send {
        text: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default, rename = "replyToId")]
        reply_to_id: Option<String>,
    },
    #[serde(rename = "typing-start")]
    TypingStart {},
    #[serde(rename = "typing-stop")]
    TypingStop {},
    #[serde(rename = "react")]
    React {
        #[serde(rename = "messageId")]
        message_id: String,
        emoji: String,
    },
    #[serde(rename = "unreact")]
    Unreact {
        #[serde(rename = "messageId")]
        message_id: String,
        emoji: String,
    },
    #[serde(rename = "admin:delete")]
    AdminDelete {
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

/// Outbound events. "Caller only" events are written straight to the
/// originating socket; the rest travel through the room event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "isAdmin")]
        is_admin: bool,
        #[serde(rename = "roomName")]
        room_name: String,
    },
    #[serde(rename = "users:list")]
    UserList(Vec<PresenceEntry>),
    #[serde(rename = "messages:history")]
    MessageHistory(Vec<Message>),
    #[serde(rename = "user:joined")]
    UserJoined(PresenceEntry),
    #[serde(rename = "user:left")]
    UserLeft {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "user:updated")]
    UserUpdated(PresenceEntry),
    #[serde(rename = "message")]
    Message(Message),
    #[serde(rename = "typing")]
    Typing {
        #[serde(rename = "userId")]
        user_id: String,
        name: String,
    },
    #[serde(rename = "stopped-typing")]
    StoppedTyping {
        #[serde(rename = "userId")]
        user_id: String,
        name: String,
    },
    #[serde(rename = "reaction:added")]
    ReactionAdded {
        #[serde(rename = "messageId")]
        message_id: String,
        emoji: String,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "userName")]
        user_name: String,
    },
    #[serde(rename = "reaction:removed")]
    ReactionRemoved {
        #[serde(rename = "messageId")]
        message_id: String,
        emoji: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "message:deleted")]
    MessageDeleted {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    #[serde(rename = "error")]
    Error { message: String, code: ErrorCode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimit,
    Invalid,
    InvalidLength,
    InvalidId,
    NotFound,
    SaveError,
    ReactionError,
    Unauthorized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_from_tagged_json() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"send","data":{"text":"gm","replyToId":"42"}}"#)
                .expect("parse send");
        match event {
            ClientEvent::Send {
                text, reply_to_id, ..
            } => {
                assert_eq!(text, "gm");
                assert_eq!(reply_to_id.as_deref(), Some("42"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"typing-start","data":{}}"#).expect("parse typing");
        assert!(matches!(event, ClientEvent::TypingStart {}));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn error_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RateLimit).expect("serialize");
        assert_eq!(json, r#""RATE_LIMIT""#);
        let json = serde_json::to_string(&ErrorCode::InvalidId).expect("serialize");
        assert_eq!(json, r#""INVALID_ID""#);
    }
}
