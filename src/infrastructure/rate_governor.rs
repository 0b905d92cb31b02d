use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::time::sleep;

use crate::RateLimitSnapshot;

/// Paces requests according to the rate limit reported by the previous response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateGovernor {
    /// Below this remaining budget, wait for the budget to refill.
    pub buffer: i64,

    /// Added to the reset time to absorb clock skew.
    pub grace: Duration,

    /// The longest single pause.
    pub max_pause: Duration,

    /// The pause between requests while the budget is comfortable.
    pub inter_request_delay: Duration,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self {
            buffer: 50,
            grace: Duration::from_secs(5),
            max_pause: Duration::from_secs(60),
            inter_request_delay: Duration::from_millis(500),
        }
    }
}

impl RateGovernor {
    /// Computes the pause due before the next request.
    pub fn pause_for(&self, rate_limit: &RateLimitSnapshot, now: DateTime<Utc>) -> Duration {
        if rate_limit.remaining >= self.buffer {
            return self.inter_request_delay;
        }
        let until_reset = (rate_limit.reset_at - now).to_std().unwrap_or_default();

        (until_reset + self.grace).min(self.max_pause)
    }

    /// Sleeps for the pause due before the next request.
    pub async fn pace(&self, rate_limit: &RateLimitSnapshot) {
        let pause = self.pause_for(rate_limit, Utc::now());
        if rate_limit.remaining < self.buffer {
            warn!("Rate limit almost exhausted ({rate_limit}), waiting for {pause:?}");
        } else {
            debug!("Waiting for {pause:?} before next request");
        }
        sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comfortable_budget_only_spaces_requests() {
        let governor = RateGovernor::default();
        let now = Utc::now();

        let pause = governor.pause_for(
            &RateLimitSnapshot::new(4999, now + chrono::Duration::seconds(600)),
            now,
        );

        assert_eq!(pause, Duration::from_millis(500));
    }

    #[test]
    fn low_budget_waits_for_reset_plus_grace() {
        let governor = RateGovernor::default();
        let now = Utc::now();

        let pause = governor.pause_for(
            &RateLimitSnapshot::new(10, now + chrono::Duration::seconds(10)),
            now,
        );

        assert_eq!(pause, Duration::from_secs(15));
    }

    #[test]
    fn low_budget_pause_is_capped() {
        let governor = RateGovernor::default();
        let now = Utc::now();

        let pause = governor.pause_for(
            &RateLimitSnapshot::new(0, now + chrono::Duration::seconds(3600)),
            now,
        );

        assert_eq!(pause, Duration::from_secs(60));
    }

    #[test]
    fn low_budget_with_past_reset_waits_for_grace_only() {
        let governor = RateGovernor::default();
        let now = Utc::now();

        let pause = governor.pause_for(
            &RateLimitSnapshot::new(0, now - chrono::Duration::seconds(30)),
            now,
        );

        assert_eq!(pause, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn pace_sleeps_until_reset() {
        let governor = RateGovernor::default();
        let start = tokio::time::Instant::now();

        governor
            .pace(&RateLimitSnapshot::new(
                0,
                Utc::now() + chrono::Duration::seconds(11),
            ))
            .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10 + 5));
        assert!(elapsed <= Duration::from_secs(60));
    }
}
