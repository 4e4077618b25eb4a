//! Retry schedule for market-data requests.

use std::time::Duration;

use crate::http_client::{HttpError, HttpErrorKind};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * factor^attempt`, capped at `max`, optionally spread by +/-50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let capped = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let capped = Duration::from_secs_f64(capped.max(0.0));
                if jitter {
                    spread(capped)
                } else {
                    capped
                }
            }
        }
    }
}

/// Uniformly pick a delay in `[delay / 2, delay * 3 / 2]`.
fn spread(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let half = millis / 2;
    Duration::from_millis(half + fastrand::u64(0..=millis))
}

/// When and how often a failed request is repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn should_retry_error(&self, error: &HttpError) -> bool {
        match error.kind() {
            HttpErrorKind::Timeout => self.retry_on_timeout,
            HttpErrorKind::Connect => self.retry_on_connect,
            HttpErrorKind::Body | HttpErrorKind::Other => false,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_until_cap() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_millis(500),
            jitter: false,
        };

        let delays: Vec<_> = (0..5).map(|attempt| backoff.delay(attempt)).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn jittered_delay_stays_within_half_band() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(400),
            factor: 1.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for attempt in 0..20 {
            let delay = backoff.delay(attempt).as_millis();
            assert!((200..=600).contains(&delay), "delay {delay}ms out of band");
        }
    }

    #[test]
    fn transport_errors_follow_flags() {
        let config = RetryConfig {
            retry_on_connect: false,
            ..RetryConfig::default()
        };

        assert!(config.should_retry_error(&HttpError::timeout("slow")));
        assert!(!config.should_retry_error(&HttpError::connect("refused")));
        assert!(!config.should_retry_error(&HttpError::new(HttpErrorKind::Body, "bad utf-8")));
        assert!(config.should_retry_status(429));
        assert!(!config.should_retry_status(404));
    }

    #[test]
    fn no_retry_allows_single_attempt() {
        assert_eq!(RetryConfig::no_retry().max_retries, 0);
        assert_eq!(
            RetryConfig::fixed(Duration::from_millis(5), 2).delay_for_attempt(1),
            Duration::from_millis(5)
        );
    }
}
