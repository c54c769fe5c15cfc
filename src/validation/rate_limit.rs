//! Fixed-window, in-process rate limiting.
//!
//! Counters are per key and reset when their window has elapsed. Expired
//! entries are swept on access, so the map never outlives idle keys for
//! long. The limiter is advisory: several instances each keep their own
//! counters, which can only relax the effective limit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Entries beyond which a sweep runs on the next access.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window counter keyed by string.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    /// Allow `limit` hits per `window` for each key.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// `limit` hits per minute.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Count one hit, failing with `RateLimited` when the window is exhausted.
    pub fn check(&self, key: &str) -> Result<()> {
        self.check_at(key, Instant::now())
    }

    /// Fail with `RateLimited` when the window is exhausted, without counting.
    pub fn ensure_available(&self, key: &str) -> Result<()> {
        self.ensure_available_at(key, Instant::now())
    }

    /// Count one hit without checking.
    pub fn record(&self, key: &str) {
        self.record_at(key, Instant::now())
    }

    /// Hits left in the current window.
    pub fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(w) if now.duration_since(w.started) < self.window => {
                self.limit.saturating_sub(w.count)
            },
            _ => self.limit,
        }
    }

    /// Forget a key.
    pub fn reset(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> Result<()> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries, now);
        let window = self.current(&mut entries, key, now);
        if window.count >= self.limit {
            return Err(self.limited(window, now));
        }
        window.count += 1;
        Ok(())
    }

    pub(crate) fn ensure_available_at(&self, key: &str, now: Instant) -> Result<()> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries, now);
        match entries.get(key) {
            Some(w) if now.duration_since(w.started) < self.window && w.count >= self.limit => {
                Err(self.limited(w, now))
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn record_at(&self, key: &str, now: Instant) {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries, now);
        let window = self.current(&mut entries, key, now);
        window.count = window.count.saturating_add(1);
    }

    fn current<'a>(
        &self,
        entries: &'a mut HashMap<String, Window>,
        key: &str,
        now: Instant,
    ) -> &'a mut Window {
        let window = entries.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                count: 0,
                started: now,
            };
        }
        window
    }

    fn limited(&self, window: &Window, now: Instant) -> Error {
        let elapsed = now.duration_since(window.started);
        let left = self.window.saturating_sub(elapsed);
        Error::RateLimited {
            retry_after_secs: left.as_secs().max(1),
        }
    }

    fn sweep(&self, entries: &mut HashMap<String, Window>, now: Instant) {
        if entries.len() < SWEEP_THRESHOLD {
            return;
        }
        let window = self.window;
        entries.retain(|_, w| now.duration_since(w.started) < window);
    }
}
