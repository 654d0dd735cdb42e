/// Static room table: membership thresholds and legacy-name aliases.
/// Configured once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub label: String,
    /// Minimum entitlement (NFT) count required to join. Admins bypass this.
    pub min_entitlements: i64,
    /// Legacy names that normalize to this room.
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
    default_room: String,
}

impl RoomRegistry {
    /// The default room must be present in the table: `resolve` is total and
    /// falls back to it, so a registry without it cannot exist.
    pub fn new(rooms: Vec<Room>, default_room: impl Into<String>) -> Self {
        let default_room = default_room.into();
        assert!(
            rooms.iter().any(|room| room.id == default_room),
            "default room '{default_room}' missing from the room table"
        );
        Self {
            rooms,
            default_room,
        }
    }

    /// The rooms that shipped with the service. "lounge" is the single room
    /// that predates multi-room support and therefore the fallback for
    /// credentials (and legacy aliases) that carry no room claim.
    pub fn builtin() -> Self {
        Self::new(
            vec![
                Room {
                    id: "lounge".to_string(),
                    label: "The Lounge".to_string(),
                    min_entitlements: 1,
                    aliases: vec!["chat".to_string(), "general".to_string()],
                },
                Room {
                    id: "whale".to_string(),
                    label: "The Whale Room".to_string(),
                    min_entitlements: 42,
                    aliases: Vec::new(),
                },
            ],
            "lounge",
        )
    }

    pub fn config_for(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == room_id)
    }

    /// Resolution is total: explicit valid room claim wins, then legacy
    /// aliases, then the default room (keeps pre-multi-room clients working
    /// without a token reissue).
    pub fn resolve(&self, claimed: Option<&str>) -> &Room {
        if let Some(claimed) = claimed {
            if let Some(room) = self.config_for(claimed) {
                return room;
            }
            if let Some(room) = self
                .rooms
                .iter()
                .find(|room| room.aliases.iter().any(|alias| alias == claimed))
            {
                return room;
            }
        }
        // The constructor guarantees the default room exists.
        self.rooms
            .iter()
            .find(|room| room.id == self.default_room)
            .unwrap_or(&self.rooms[0])
    }

    pub fn is_eligible(&self, entitlements: i64, room_id: &str, is_admin: bool) -> bool {
        if is_admin {
            return true;
        }
        match self.config_for(room_id) {
            Some(room) => entitlements >= room.min_entitlements,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_room_claim_wins() {
        let registry = RoomRegistry::builtin();
        assert_eq!(registry.resolve(Some("whale")).id, "whale");
    }

    #[test]
    fn legacy_aliases_map_to_canonical_room() {
        let registry = RoomRegistry::builtin();
        assert_eq!(registry.resolve(Some("chat")).id, "lounge");
        assert_eq!(registry.resolve(Some("general")).id, "lounge");
    }

    #[test]
    fn unknown_and_missing_claims_fall_back_to_default() {
        let registry = RoomRegistry::builtin();
        assert_eq!(registry.resolve(None).id, "lounge");
        assert_eq!(registry.resolve(Some("no-such-room")).id, "lounge");
    }

    #[test]
    #[should_panic(expected = "default room")]
    fn registry_without_its_default_room_is_refused() {
        RoomRegistry::new(Vec::new(), "lounge");
    }

    #[test]
    fn eligibility_threshold_and_admin_bypass() {
        let registry = RoomRegistry::builtin();
        assert!(registry.is_eligible(42, "whale", false));
        assert!(!registry.is_eligible(41, "whale", false));
        assert!(registry.is_eligible(0, "whale", true));
        assert!(!registry.is_eligible(100, "no-such-room", false));
    }
}
