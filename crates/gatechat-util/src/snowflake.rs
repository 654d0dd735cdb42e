use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2024-01-01T00:00:00Z
const GATECHAT_EPOCH: u64 = 1_704_067_200_000;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a Snowflake ID.
/// Format: 42 bits timestamp | 10 bits worker | 12 bits sequence
pub fn generate(worker_id: u16) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    let timestamp = millis_since_epoch(now);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFF;
    let id = (timestamp << 22) | ((worker_id as u64 & 0x3FF) << 12) | seq;
    id as i64
}

/// Clamps to zero instead of underflowing when the host clock predates the
/// epoch; id generation must never panic on a skewed clock.
fn millis_since_epoch(now_millis: u64) -> u64 {
    now_millis.saturating_sub(GATECHAT_EPOCH)
}

/// Extract the Unix timestamp (ms) from a snowflake.
pub fn timestamp_millis(id: i64) -> u64 {
    ((id as u64) >> 22) + GATECHAT_EPOCH
}

/// Parse a client-supplied message id. Returns `None` for anything that is
/// not a well-formed positive snowflake key.
pub fn parse(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_monotonic_within_a_worker() {
        let a = generate(1);
        let b = generate(1);
        assert!(b > a);
    }

    #[test]
    fn timestamp_round_trips_through_the_id() {
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_millis() as u64;
        let id = generate(3);
        let ts = timestamp_millis(id);
        assert!(ts >= before && ts <= before + 1_000);
    }

    #[test]
    fn skewed_clock_clamps_instead_of_underflowing() {
        assert_eq!(millis_since_epoch(GATECHAT_EPOCH - 5_000), 0);
        assert_eq!(millis_since_epoch(0), 0);
        assert_eq!(millis_since_epoch(GATECHAT_EPOCH + 7), 7);
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert_eq!(parse("12345"), Some(12345));
        assert_eq!(parse(" 77 "), Some(77));
        assert_eq!(parse("0"), None);
        assert_eq!(parse("-4"), None);
        assert_eq!(parse("deadbeef"), None);
        assert_eq!(parse(""), None);
    }
}
