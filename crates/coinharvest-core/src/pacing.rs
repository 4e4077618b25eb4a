use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

/// Future returned by pacing hooks.
pub type PacingFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Decides how long a sequential run waits between upstream requests.
///
/// The orchestrators call [`PacingPolicy::before_request`] ahead of every
/// request and [`PacingPolicy::pause_after_batch`] between consecutive
/// batches, never after the last one.
pub trait PacingPolicy: Send + Sync {
    fn before_request(&self) -> PacingFuture<'_>;

    fn pause_after_batch(&self, batch_index: usize) -> PacingFuture<'_>;
}

/// Fixed sleep between batches, no per-request wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl PacingPolicy for FixedDelay {
    fn before_request(&self) -> PacingFuture<'_> {
        Box::pin(async {})
    }

    fn pause_after_batch(&self, batch_index: usize) -> PacingFuture<'_> {
        let delay = self.0;
        Box::pin(async move {
            tracing::debug!(batch_index, delay_ms = delay.as_millis() as u64, "pausing between batches");
            tokio::time::sleep(delay).await;
        })
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoDelay;

impl PacingPolicy for NoDelay {
    fn before_request(&self) -> PacingFuture<'_> {
        Box::pin(async {})
    }

    fn pause_after_batch(&self, _batch_index: usize) -> PacingFuture<'_> {
        Box::pin(async {})
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket admitting `limit` requests per `window`; batches are not paused.
#[derive(Clone)]
pub struct TokenBucket {
    limiter: Arc<DirectRateLimiter>,
}

impl TokenBucket {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(window, limit))),
        }
    }

    /// Whether a request could go out right now. Consumes a token on success.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl PacingPolicy for TokenBucket {
    fn before_request(&self) -> PacingFuture<'_> {
        Box::pin(async move {
            self.limiter.until_ready().await;
        })
    }

    fn pause_after_batch(&self, _batch_index: usize) -> PacingFuture<'_> {
        Box::pin(async {})
    }
}

/// Longest replenish period a quota is given; governor tracks nanoseconds in a `u64`.
const MAX_SECONDS_PER_CELL: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Spread `limit` cells evenly over `window`, allowing a burst of `limit`.
fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell =
        (window.as_secs_f64() / f64::from(burst.get())).clamp(0.001, MAX_SECONDS_PER_CELL);

    Duration::try_from_secs_f64(seconds_per_cell)
        .ok()
        .and_then(Quota::with_period)
        .map(|quota| quota.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(burst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_admits_burst_then_refuses() {
        let bucket = TokenBucket::new(Duration::from_secs(60), 2);

        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn zero_limit_is_treated_as_one() {
        let bucket = TokenBucket::new(Duration::from_secs(60), 0);

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn oversized_window_still_builds_a_bucket() {
        let bucket = TokenBucket::new(Duration::MAX, 1);

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn zero_window_is_floored_to_a_millisecond() {
        let quota = quota_from_window(Duration::ZERO, 3);

        assert_eq!(quota.replenish_interval(), Duration::from_millis(1));
        assert_eq!(quota.burst_size().get(), 3);
    }

    #[tokio::test]
    async fn fixed_delay_sleeps_between_batches() {
        let pacing = FixedDelay(Duration::from_millis(20));
        let started = std::time::Instant::now();

        pacing.before_request().await;
        pacing.pause_after_batch(0).await;

        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
