use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use reqwest::header::HeaderMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

pub struct RateLimiter {
    state: Arc<Mutex<RateLimitState>>,
    requests_per_minute: Option<u32>,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_requests_per_minute(None)
    }

    /// `requests_per_minute` adds a soft cap on top of GitHub's own quota.
    pub fn with_requests_per_minute(requests_per_minute: Option<u32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimitState {
                remaining: 5000,
                reset_at: None,
                requests_this_minute: 0,
                minute_start: Instant::now(),
            })),
            requests_per_minute: requests_per_minute.filter(|n| *n > 0),
        }
    }

    pub async fn wait(&self) {
        let mut state = self.state.lock().await;

        if state.remaining == 0 {
            if let Some(reset_at) = state.reset_at {
                let now = Instant::now();
                if reset_at > now {
                    let wait_duration = reset_at - now;
                    drop(state);
                    tracing::info!("GitHub quota exhausted, waiting {:?}", wait_duration);
                    sleep(wait_duration).await;
                    state = self.state.lock().await;
                }
            }
            // Assume the window rolled over; the next response corrects it.
            state.remaining = 1;
            state.reset_at = None;
        }

        let Some(limit) = self.requests_per_minute else {
            return;
        };

        let minute_elapsed = state.minute_start.elapsed();
        if minute_elapsed < Duration::from_secs(60) {
            if state.requests_this_minute >= limit {
                let wait_time = Duration::from_secs(60) - minute_elapsed;
                drop(state);
                tracing::debug!("Soft rate limiting, waiting {:?}", wait_time);
                sleep(wait_time).await;
                state = self.state.lock().await;
                state.requests_this_minute = 0;
                state.minute_start = Instant::now();
            }
        } else {
            state.requests_this_minute = 0;
            state.minute_start = Instant::now();
        }

        state.requests_this_minute += 1;
    }

    pub async fn update_from_headers(&self, headers: &HeaderMap) {
        let Some(remaining) = header_number::<u32>(headers, "x-ratelimit-remaining") else {
            return;
        };
        let reset = header_number::<u64>(headers, "x-ratelimit-reset");

        let mut state = self.state.lock().await;
        state.remaining = remaining;
        if let Some(reset_timestamp) = reset {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            state.reset_at = (reset_timestamp > now)
                .then(|| Instant::now() + Duration::from_secs(reset_timestamp - now));
        }
    }

    pub async fn remaining(&self) -> u32 {
        self.state.lock().await.remaining
    }

    /// Seconds until the quota resets, if GitHub reported a reset time.
    pub async fn seconds_until_reset(&self) -> Option<u64> {
        let state = self.state.lock().await;
        state
            .reset_at
            .map(|at| at.saturating_duration_since(Instant::now()).as_secs())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[tokio::test]
    async fn test_update_from_headers_tracks_remaining() {
        let limiter = RateLimiter::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));

        limiter.update_from_headers(&headers).await;
        assert_eq!(limiter.remaining().await, 42);
        assert!(limiter.seconds_until_reset().await.is_none());
    }

    #[tokio::test]
    async fn test_headers_without_quota_are_ignored() {
        let limiter = RateLimiter::new();
        limiter.update_from_headers(&HeaderMap::new()).await;
        assert_eq!(limiter.remaining().await, 5000);
    }

    #[tokio::test]
    async fn test_wait_does_not_block_with_quota_left() {
        let limiter = RateLimiter::with_requests_per_minute(Some(100));
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
