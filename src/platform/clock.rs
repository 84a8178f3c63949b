use std::time::Duration;

use async_trait::async_trait;

use crate::platform::runtime;

/// Time source and timer used by every wait in the sign-in flow.
///
/// Injecting the clock keeps the polling state machine testable without real
/// timers: a test clock can advance virtual time instead of sleeping.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono` and the platform timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn sleep(&self, duration: Duration) {
        runtime::sleep(duration).await;
    }
}

/// Milliseconds elapsed between `earlier` and `now`, clamped at zero so a
/// clock skewed backwards never yields a negative age.
pub fn elapsed_since(now_millis: i64, earlier_millis: i64) -> Duration {
    Duration::from_millis(now_millis.saturating_sub(earlier_millis).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_clamped_for_future_timestamps() {
        assert_eq!(elapsed_since(1_000, 5_000), Duration::ZERO);
        assert_eq!(elapsed_since(5_000, 1_000), Duration::from_millis(4_000));
    }

    #[test]
    fn system_clock_reports_current_epoch() {
        let now = SystemClock.now_millis();
        // 2020-01-01T00:00:00Z
        assert!(now > 1_577_836_800_000);
    }
}
