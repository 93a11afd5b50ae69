use std::time::Duration;

/// Reconnect policy for the live channel: a fixed delay between attempts
/// and a bounded attempt count. REST send failures surface to the user for
/// manual retry and never consult this.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// The delay to wait before the next attempt, or `None` once the
    /// attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.delay)
    }

    /// Call after a successful connect so a later drop starts fresh.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_bounded_and_delay_is_fixed() {
        let mut b = Backoff::new(Duration::from_secs(2), 3);
        assert_eq!(b.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(b.next_delay(), None);
        assert_eq!(b.attempts(), 3);
    }

    #[test]
    fn reset_restores_the_budget() {
        let mut b = Backoff::new(Duration::from_millis(500), 1);
        assert!(b.next_delay().is_some());
        assert!(b.next_delay().is_none());
        b.reset();
        assert!(b.next_delay().is_some());
    }
}
