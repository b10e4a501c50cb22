//! Time source used by every timer in the crate.
//!
//! Stall detection, loop windows, retry cooldowns and the daily quota boundary
//! all read the injected [`Clock`] instead of calling `Utc::now()` directly.

use chrono::{DateTime, Utc};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Block for `duration`. Grace waits go through here so tests can
    /// advance a manual clock instead of sleeping.
    fn sleep(&self, duration: std::time::Duration) {
        std::thread::sleep(duration);
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Milliseconds elapsed between two instants, clamped at zero.
pub fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(since).num_milliseconds().max(0) as u64
}

/// Format a millisecond span the way status messages show it.
pub fn human_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{}s", (ms as f64 / 1_000.0).round() as u64)
    } else if ms < 3_600_000 {
        format!("{}m", (ms as f64 / 60_000.0).round() as u64)
    } else {
        format!("{:.1}h", ms as f64 / 3_600_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_is_never_negative() {
        let now = Utc::now();
        assert_eq!(elapsed_ms(now + Duration::seconds(5), now), 0);
        assert_eq!(elapsed_ms(now - Duration::milliseconds(1500), now), 1500);
    }

    #[test]
    fn human_duration_picks_unit() {
        assert_eq!(human_duration(250), "250ms");
        assert_eq!(human_duration(42_000), "42s");
        assert_eq!(human_duration(180_000), "3m");
        assert_eq!(human_duration(5_400_000), "1.5h");
    }
}
