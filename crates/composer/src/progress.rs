//! Progress reporting throttle

use std::time::{Duration, Instant};

/// Lets a progress notification through at most once per interval
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl ProgressThrottle {
    /// The interval counts from `started`
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last: started,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Composed share of the expected frames, 0..=100
pub fn percent(composed: u64, expected: u64) -> u8 {
    if expected == 0 {
        return 0;
    }
    (composed.saturating_mul(100) / expected).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(Duration::from_secs(5), start);

        assert!(!throttle.ready(start + Duration::from_secs(1)));
        assert!(throttle.ready(start + Duration::from_secs(5)));
        assert!(!throttle.ready(start + Duration::from_secs(9)));
        assert!(throttle.ready(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(50, 200), 25);
        assert_eq!(percent(199, 200), 99);
        assert_eq!(percent(300, 200), 100);
    }
}
