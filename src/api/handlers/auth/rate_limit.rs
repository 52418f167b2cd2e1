//! Rate limiting primitives for the credential endpoints.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Endpoint class with its own counters. Login is stricter than the
/// refresh/admin class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitClass {
    Login,
    Refresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, class: RateLimitClass) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _class: RateLimitClass) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Permit budget for one class over one fixed window.
#[derive(Clone, Copy, Debug)]
pub struct WindowPolicy {
    permit_limit: u32,
    window: Duration,
}

impl WindowPolicy {
    #[must_use]
    pub const fn new(permit_limit: u32, window: Duration) -> Self {
        Self {
            permit_limit,
            window,
        }
    }
}

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window counters keyed by (class, client ip). Counters reset when
/// their window lapses; a burst straddling a boundary can admit up to twice
/// the nominal rate, which the policy accepts.
pub struct FixedWindowRateLimiter {
    login: WindowPolicy,
    refresh: WindowPolicy,
    windows: Mutex<HashMap<(RateLimitClass, String), Window>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(login: WindowPolicy, refresh: WindowPolicy) -> Self {
        Self {
            login,
            refresh,
            windows: Mutex::new(HashMap::new()),
        }
    }

    const fn policy(&self, class: RateLimitClass) -> WindowPolicy {
        match class {
            RateLimitClass::Login => self.login,
            RateLimitClass::Refresh => self.refresh,
        }
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, class: RateLimitClass) -> RateLimitDecision {
        let policy = self.policy(class);
        let now = Instant::now();

        // Counter state must stay usable even if a holder panicked.
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        windows.retain(|(entry_class, _), window| {
            now.duration_since(window.started_at) < self.policy(*entry_class).window
        });

        let key = (class, ip.unwrap_or("unknown").to_string());
        let window = windows.entry(key).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if window.count >= policy.permit_limit {
            return RateLimitDecision::Limited;
        }

        window.count += 1;
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(login_limit: u32, window: Duration) -> FixedWindowRateLimiter {
        FixedWindowRateLimiter::new(
            WindowPolicy::new(login_limit, window),
            WindowPolicy::new(10, window),
        )
    }

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Refresh),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn sixth_request_in_window_limited() {
        let limiter = limiter(5, Duration::from_secs(3_600));

        for _ in 0..5 {
            assert_eq!(
                limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn new_window_admits_again() {
        let limiter = limiter(2, Duration::from_millis(50));

        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Limited
        );

        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn distinct_ips_do_not_share_counters() {
        let limiter = limiter(1, Duration::from_secs(3_600));

        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.8"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn classes_do_not_share_counters() {
        let limiter = limiter(1, Duration::from_secs(3_600));

        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Login),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.check_ip(Some("203.0.113.7"), RateLimitClass::Refresh),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn missing_ip_shares_one_bucket() {
        let limiter = limiter(1, Duration::from_secs(3_600));

        assert_eq!(
            limiter.check_ip(None, RateLimitClass::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(None, RateLimitClass::Login),
            RateLimitDecision::Limited
        );
    }
}
