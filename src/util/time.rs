//! Time utilities

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Milliseconds as sent over the wire, saturating on overflow
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Tick length requested by a client, rejecting zero
pub fn tick_delta(time_delta_ms: u64) -> Option<Duration> {
    (time_delta_ms > 0).then(|| Duration::from_millis(time_delta_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis() {
        assert_eq!(millis(Duration::from_secs_f64(1.5)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_tick_delta() {
        assert_eq!(tick_delta(0), None);
        assert_eq!(tick_delta(250), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_uptime_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
    }
}
