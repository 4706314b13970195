use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

/// Spacing between cascade runs in a batch.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(1_200);

const MIN_INTERVAL: Duration = Duration::from_millis(1);

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Fixed-interval scheduler for batch runs.
///
/// Lets one request through per interval with no burst. It sits outside the
/// cascade: the batch driver waits on it before each request.
#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next slot.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_INTERVAL)
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn first_slot_is_free_and_the_second_waits_a_full_interval() {
        let pacer = Pacer::new(Duration::from_secs(60));

        let first = tokio::time::timeout(Duration::from_millis(200), pacer.until_ready()).await;
        assert!(first.is_ok());
        let second = tokio::time::timeout(Duration::from_millis(200), pacer.until_ready()).await;
        assert!(second.is_err());
    }

    #[test]
    fn zero_interval_is_clamped() {
        assert_eq!(Pacer::new(Duration::ZERO).interval(), MIN_INTERVAL);
    }

    #[tokio::test]
    async fn until_ready_spaces_requests() {
        let pacer = Pacer::new(Duration::from_millis(30));
        let started = Instant::now();
        for _ in 0..3 {
            pacer.until_ready().await;
        }
        assert!(started.elapsed() >= Duration::from_millis(55));
    }
}
