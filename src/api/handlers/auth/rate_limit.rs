//! Rate limiting primitives for auth flows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Signup,
    Login,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, action: RateLimitAction, identifier: &str) -> RateLimitDecision;
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window limiter keyed by (action, identifier).
///
/// Windows never slide; a full window denies until it expires. Expired windows
/// are pruned on access, so the map stays bounded by active identifiers.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<(RateLimitAction, String), Window>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_seconds),
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, action: RateLimitAction, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        windows.retain(|_, window| now.duration_since(window.started_at) < self.window);

        let key = (action, identifier.to_string());
        if let Some(window) = windows.get_mut(&key) {
            if window.count >= self.max_requests {
                let elapsed = now.duration_since(window.started_at);
                let remaining = self.window.saturating_sub(elapsed);
                return RateLimitDecision::Limited {
                    retry_after_seconds: remaining.as_secs().max(1),
                };
            }
            window.count += 1;
        } else {
            windows.insert(
                key,
                Window {
                    started_at: now,
                    count: 1,
                },
            );
        }

        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _action: RateLimitAction, _identifier: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}
