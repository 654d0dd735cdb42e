use serde::{Deserialize, Serialize};

/// One user's visible online state within one room. Shared by all of that
/// user's open connections to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub nft_count: i64,
    pub is_admin: bool,
}
