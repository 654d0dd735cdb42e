use chrono::{DateTime, Duration, Utc};

/// Message-rate profile. The default matches the lounge deployment; a
/// stricter profile is available for rooms that want it.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_messages: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            window: Duration::seconds(60),
        }
    }
}

impl RateLimitConfig {
    pub fn strict() -> Self {
        Self {
            max_messages: 10,
            window: Duration::seconds(60),
        }
    }
}

/// Fixed-window counter. Connection-local: no synchronization, no
/// persistence, resets naturally on reconnect. Time is passed in so tests
/// can drive the clock.
#[derive(Debug)]
pub struct FixedWindow {
    config: RateLimitConfig,
    count: u32,
    resets_at: Option<DateTime<Utc>>,
}

impl FixedWindow {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            count: 0,
            resets_at: None,
        }
    }

    /// Admit or reject one message at `now`. A rejected message is dropped
    /// by the caller, never queued for replay.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        match self.resets_at {
            Some(resets_at) if now < resets_at => {}
            _ => {
                self.count = 0;
                self.resets_at = Some(now + self.config.window);
            }
        }
        self.count += 1;
        self.count <= self.config.max_messages
    }

    pub fn current_count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_is_exact_within_one_window() {
        let mut window = FixedWindow::new(RateLimitConfig::default());
        let start = Utc::now();
        for i in 0..20 {
            assert!(window.admit(start + Duration::seconds(i)), "call {i}");
        }
        assert!(!window.admit(start + Duration::seconds(30)));
        assert!(!window.admit(start + Duration::seconds(59)));
    }

    #[test]
    fn window_boundary_resets_the_counter_to_one() {
        let mut window = FixedWindow::new(RateLimitConfig::default());
        let start = Utc::now();
        for _ in 0..25 {
            window.admit(start);
        }
        assert!(window.admit(start + Duration::seconds(60)));
        assert_eq!(window.current_count(), 1);
    }

    #[test]
    fn strict_profile_caps_at_ten() {
        let mut window = FixedWindow::new(RateLimitConfig::strict());
        let start = Utc::now();
        for _ in 0..10 {
            assert!(window.admit(start));
        }
        assert!(!window.admit(start));
    }
}
