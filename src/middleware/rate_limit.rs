use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

use super::Middleware;
use crate::application::AppContext;
use crate::dispatcher::HandlerError;
use crate::server::{Request, Response};

/// Requests allowed per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u64,
    pub period: Duration,
}

impl RateLimit {
    #[must_use]
    pub const fn per_minute(requests: u64) -> Self {
        Self {
            requests,
            period: Duration::from_secs(60),
        }
    }
}

/// Counter persisted in the cache per client and tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Window {
    count: u64,
    reset: u64,
}

/// Fixed-window request limiting keyed by client IP.
///
/// Paths under `/api/` use the api tier, paths containing `/login` the login
/// tier, everything else the default tier. Counters live in the application cache, so they
/// survive restarts and are shared by every worker using the same storage.
#[derive(Debug)]
pub struct RateLimitMiddleware {
    default: RateLimit,
    api: RateLimit,
    login: RateLimit,
    lock: Mutex<()>,
}

impl Default for RateLimitMiddleware {
    fn default() -> Self {
        Self::new(
            RateLimit::per_minute(100),
            RateLimit::per_minute(60),
            RateLimit::per_minute(5),
        )
    }
}

impl RateLimitMiddleware {
    #[must_use]
    pub fn new(default: RateLimit, api: RateLimit, login: RateLimit) -> Self {
        Self {
            default,
            api,
            login,
            lock: Mutex::new(()),
        }
    }

    /// Tier name and limit applying to `path`.
    #[must_use]
    pub fn tier_for(&self, path: &str) -> (&'static str, RateLimit) {
        if path.starts_with("/api/") {
            ("api", self.api)
        } else if path.contains("/login") {
            ("login", self.login)
        } else {
            ("default", self.default)
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Middleware for RateLimitMiddleware {
    fn handle(
        &self,
        ctx: &AppContext,
        req: &Request,
        res: &mut Response,
    ) -> Result<bool, HandlerError> {
        let (tier, limit) = self.tier_for(req.path());
        let key = format!("rate_limit:{}:{}", req.ip(), tier);

        // Read-modify-write of the counter must not interleave.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = unix_now();
        let mut window = ctx
            .cache()
            .get::<Window>(&key)?
            .filter(|w| now <= w.reset)
            .unwrap_or(Window {
                count: 0,
                reset: now + limit.period.as_secs(),
            });

        res.set_header("X-RateLimit-Limit", limit.requests.to_string());
        res.set_header("X-RateLimit-Reset", window.reset.to_string());

        if window.count >= limit.requests {
            warn!(ip = %req.ip(), tier, limit = limit.requests, "Rate limit exceeded");
            res.set_header("X-RateLimit-Remaining", "0");
            res.set_header("Retry-After", window.reset.saturating_sub(now).to_string());
            res.set_status(429)
                .json(&json!({ "error": "Too many requests" }));
            return Ok(false);
        }

        window.count += 1;
        let ttl = Duration::from_secs(window.reset.saturating_sub(now).max(1));
        ctx.cache().set(&key, &window, ttl)?;
        res.set_header(
            "X-RateLimit-Remaining",
            (limit.requests - window.count).to_string(),
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_selection() {
        let mw = RateLimitMiddleware::default();
        assert_eq!(mw.tier_for("/api/data").0, "api");
        assert_eq!(mw.tier_for("/login").0, "login");
        assert_eq!(mw.tier_for("/admin/login").0, "login");
        assert_eq!(mw.tier_for("/logout").0, "default");
        assert_eq!(mw.tier_for("/").0, "default");
        assert_eq!(mw.tier_for("/api/data").1.requests, 60);
        assert_eq!(mw.tier_for("/login").1.requests, 5);
        assert_eq!(mw.tier_for("/about").1.requests, 100);
    }
}
