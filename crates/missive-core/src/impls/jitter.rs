//! JitterRateLimiter - 人が送っているような送信間隔
//!
//! 区間 `[min, max]` から一様に待ち時間を引く（デフォルト 0.2s〜2.0s）。

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::ports::RateLimiter;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct JitterRateLimiter {
    min: Duration,
    max: Duration,
}

impl JitterRateLimiter {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for JitterRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

#[async_trait]
impl RateLimiter for JitterRateLimiter {
    async fn delay(&self) {
        let wait = self.sample();
        tracing::debug!(wait_ms = wait.as_millis() as u64, "pacing before next send");
        tokio::time::sleep(wait).await;
    }
}

/// No pacing at all (dry runs, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn delay(&self) {}
}
