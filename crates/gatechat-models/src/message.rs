use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message with the sender snapshot taken at send time.
/// Profile changes after the fact never alter history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Snowflake id, stringified for clients.
    pub id: String,
    pub room_id: String,
    pub text: String,
    pub sender: MessageSender,
    pub reply_to: Option<ReplyRef>,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub nft_count: i64,
}

/// Quoted reference to an earlier message, captured at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
    pub id: String,
    pub excerpt: String,
    pub sender_name: String,
}

/// One emoji's reacting users on a message. An entry with no users is
/// pruned rather than serialized empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<ReactionUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUser {
    pub id: String,
    pub name: String,
}

/// Input to message creation; the store assigns the id and timestamp.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub text: String,
    pub sender: MessageSender,
    pub reply_to: Option<ReplyRef>,
}
