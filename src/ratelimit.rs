//! Per-source request admission control.
//!
//! A fixed 60-second window with a per-key request count, capacity-bounded
//! with least-recently-used eviction. This governs fairness and cost, not
//! authorization: source keys (usually client IPs) can be spoofed, and the
//! table is not persisted across restarts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Length of the counting window.
    pub window: Duration,
    /// Requests admitted per key per window.
    pub max_requests: u32,
    /// Maximum number of tracked keys before LRU eviction kicks in.
    pub max_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 20,
            max_keys: 500,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
    last_seen: Instant,
}

/// Sliding-window admission cache keyed by source address.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request from `key`.
    ///
    /// On `false` the caller must answer 429 and perform no side effect.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Number of keys currently tracked. Exposed for the metrics endpoint.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().expect("rate limiter lock poisoned").len()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        if let Some(window) = windows.get_mut(key) {
            window.last_seen = now;
            if now.duration_since(window.started) >= self.config.window {
                // Window elapsed: reset and admit.
                window.started = now;
                window.count = 1;
                return true;
            }
            if window.count >= self.config.max_requests {
                return false;
            }
            window.count += 1;
            return true;
        }

        if windows.len() >= self.config.max_keys {
            Self::evict(&mut windows, self.config.window, now);
        }

        windows.insert(
            key.to_string(),
            Window {
                started: now,
                count: 1,
                last_seen: now,
            },
        );
        true
    }

    /// Drop expired windows; if none expired, drop the least recently used
    /// key so the table never exceeds `max_keys`.
    fn evict(windows: &mut HashMap<String, Window>, window_len: Duration, now: Instant) {
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.last_seen) < window_len);
        if windows.len() < before {
            return;
        }
        if let Some(oldest) = windows
            .iter()
            .min_by_key(|(_, w)| w.last_seen)
            .map(|(k, _)| k.clone())
        {
            windows.remove(&oldest);
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
