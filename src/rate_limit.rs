use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Instant;

/// Configurable rate limit values. All read from environment variables with
/// sensible defaults.
///
/// Environment variables:
/// - `RATE_LIMIT_REGISTER` — Max registrations per hour per IP (default: 10)
/// - `RATE_LIMIT_LOGIN` — Max login attempts per minute per IP (default: 10)
/// - `RATE_LIMIT_MESSAGES` — Max message creates per minute per user (default: 30)
/// - `RATE_LIMIT_SLACK` — Max Slack webhook calls per minute per Slack user (default: 30)
pub struct RateLimitConfig {
    pub register_max: usize,
    pub register_window_secs: u64,
    pub login_max: usize,
    pub login_window_secs: u64,
    pub messages_max: usize,
    pub messages_window_secs: u64,
    pub slack_max: usize,
    pub slack_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            register_max: 10,
            register_window_secs: 3600,
            login_max: 10,
            login_window_secs: 60,
            messages_max: 30,
            messages_window_secs: 60,
            slack_max: 30,
            slack_window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("RATE_LIMIT_REGISTER")
            && let Ok(n) = val.parse::<usize>()
        {
            config.register_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_LOGIN")
            && let Ok(n) = val.parse::<usize>()
        {
            config.login_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_MESSAGES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.messages_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_SLACK")
            && let Ok(n) = val.parse::<usize>()
        {
            config.slack_max = n;
        }

        config
    }
}

pub struct RateLimiter {
    limits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// Sliding-window check. `key` is typically "action:ip" or "action:user".
    /// Returns true if the request is allowed.
    pub fn check(&self, key: &str, max: usize, window_secs: u64) -> bool {
        let mut limits = self.limits.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = std::time::Duration::from_secs(window_secs);

        let entries = limits.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() >= max {
            return false;
        }
        entries.push(now);
        true
    }
}
