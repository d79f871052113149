//! Per-client request budgets.
//!
//! Handlers ask a [`RateLimiter`] before running a probe. The in-memory
//! [`FixedWindowLimiter`] counts requests per key in fixed windows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
    },
    Limited {
        /// Time until the current window ends.
        retry_after: Duration,
    },
}

pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` against a budget of `limit` per window.
    fn check(&self, key: &str, limit: u32) -> Decision;
}

/// Limiter that never limits, for disabled rate limiting.
#[derive(Debug, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn check(&self, _key: &str, _limit: u32) -> Decision {
        Decision::Allowed {
            remaining: u32::MAX,
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per key.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, limit: u32, now: Instant) -> Decision {
        let Ok(mut windows) = self.windows.lock() else {
            // Poisoned lock: fail open.
            return Decision::Allowed { remaining: 0 };
        };

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < limit {
            window.count += 1;
            Decision::Allowed {
                remaining: limit - window.count,
            }
        } else {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(window.started));
            debug!(key, ?retry_after, "Rate limit exceeded");
            Decision::Limited { retry_after }
        }
    }

    /// Drop windows that have ended. Called periodically by the server.
    pub fn purge_expired(&self) {
        self.purge_expired_at(Instant::now());
    }

    fn purge_expired_at(&self, now: Instant) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().map_or(0, |w| w.len())
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str, limit: u32) -> Decision {
        self.check_at(key, limit, Instant::now())
    }
}

/// Whole seconds for a `Retry-After` header, at least 1.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
