use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gatechat_models::PresenceEntry;
use std::collections::HashMap;

#[derive(Debug)]
struct Slot {
    connections: usize,
    entry: PresenceEntry,
}

/// Per-room presence with multi-tab coalescing. Counter and entry live in
/// one slot so connect/disconnect for a (room, user) pair are atomic; no
/// guard is ever held across an await point.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    slots: DashMap<(String, String), Slot>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this is the user's first open connection to the
    /// room, i.e. the caller should broadcast "user joined". Additional tabs
    /// share the existing entry and broadcast nothing.
    pub fn connect(&self, room_id: &str, user_id: &str, entry: PresenceEntry) -> bool {
        match self.slots.entry((room_id.to_string(), user_id.to_string())) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().connections += 1;
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    connections: 1,
                    entry,
                });
                true
            }
        }
    }

    /// Returns the number of connections the user still has open in the
    /// room. At zero the slot is removed and the caller should broadcast
    /// "user left". Disconnecting with no matching slot is a safe no-op;
    /// the counter never goes negative.
    pub fn disconnect(&self, room_id: &str, user_id: &str) -> usize {
        match self.slots.entry((room_id.to_string(), user_id.to_string())) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.connections = slot.connections.saturating_sub(1);
                let remaining = slot.connections;
                if remaining == 0 {
                    occupied.remove();
                }
                remaining
            }
            Entry::Vacant(_) => 0,
        }
    }

    /// Merge non-empty fields into an existing entry and return the updated
    /// copy for broadcast. No-op when the user has no presence in the room.
    pub fn update(
        &self,
        room_id: &str,
        user_id: &str,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> Option<PresenceEntry> {
        let mut slot = self
            .slots
            .get_mut(&(room_id.to_string(), user_id.to_string()))?;
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            slot.entry.name = name.to_string();
        }
        if let Some(avatar) = avatar.map(str::trim).filter(|avatar| !avatar.is_empty()) {
            slot.entry.avatar = Some(avatar.to_string());
        }
        Some(slot.entry.clone())
    }

    /// Unordered snapshot of everyone present in a room.
    pub fn list(&self, room_id: &str) -> Vec<PresenceEntry> {
        self.slots
            .iter()
            .filter(|slot| slot.key().0 == room_id)
            .map(|slot| slot.value().entry.clone())
            .collect()
    }

    pub fn count(&self, room_id: &str) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.key().0 == room_id)
            .count()
    }

    /// Presence counts per room, for the liveness endpoint.
    pub fn room_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for slot in self.slots.iter() {
            *counts.entry(slot.key().0.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(user_id: &str) -> PresenceEntry {
        PresenceEntry {
            user_id: user_id.to_string(),
            name: user_id.to_string(),
            avatar: None,
            nft_count: 1,
            is_admin: false,
        }
    }

    #[test]
    fn first_connection_joins_and_last_disconnect_leaves() {
        let tracker = PresenceTracker::new();
        assert!(tracker.connect("whale", "0xabc", entry("0xabc")));
        assert!(!tracker.connect("whale", "0xabc", entry("0xabc")));
        assert_eq!(tracker.list("whale").len(), 1);

        assert_eq!(tracker.disconnect("whale", "0xabc"), 1);
        assert_eq!(tracker.list("whale").len(), 1);
        assert_eq!(tracker.disconnect("whale", "0xabc"), 0);
        assert!(tracker.list("whale").is_empty());
    }

    #[test]
    fn double_disconnect_is_a_safe_noop() {
        let tracker = PresenceTracker::new();
        tracker.connect("whale", "0xabc", entry("0xabc"));
        assert_eq!(tracker.disconnect("whale", "0xabc"), 0);
        assert_eq!(tracker.disconnect("whale", "0xabc"), 0);
        assert!(tracker.list("whale").is_empty());
    }

    #[test]
    fn update_merges_only_non_empty_fields() {
        let tracker = PresenceTracker::new();
        tracker.connect("whale", "0xabc", entry("0xabc"));
        let updated = tracker
            .update("whale", "0xabc", Some("whale_main"), Some(""))
            .expect("entry exists");
        assert_eq!(updated.name, "whale_main");
        assert_eq!(updated.avatar, None);
        // No presence, no update.
        assert!(tracker.update("whale", "0xother", Some("x"), None).is_none());
    }

    #[test]
    fn rooms_do_not_share_presence() {
        let tracker = PresenceTracker::new();
        tracker.connect("whale", "0xabc", entry("0xabc"));
        tracker.connect("lounge", "0xabc", entry("0xabc"));
        assert_eq!(tracker.count("whale"), 1);
        assert_eq!(tracker.count("lounge"), 1);
        tracker.disconnect("whale", "0xabc");
        assert_eq!(tracker.count("whale"), 0);
        assert_eq!(tracker.count("lounge"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_connects_and_disconnects_converge_to_empty() {
        let tracker = Arc::new(PresenceTracker::new());
        let n = 64;

        let connects: Vec<_> = (0..n)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.connect("whale", "0xabc", entry("0xabc")) })
            })
            .collect();
        let mut first_count = 0;
        for handle in connects {
            if handle.await.expect("join") {
                first_count += 1;
            }
        }
        assert_eq!(first_count, 1);

        let disconnects: Vec<_> = (0..n)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.disconnect("whale", "0xabc") })
            })
            .collect();
        let mut zero_count = 0;
        for handle in disconnects {
            if handle.await.expect("join") == 0 {
                zero_count += 1;
            }
        }
        assert_eq!(zero_count, 1);
        assert!(tracker.list("whale").is_empty());
        assert_eq!(tracker.count("whale"), 0);
    }
}
