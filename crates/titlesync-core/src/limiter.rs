//! Sliding-window rate limiting for pipeline invocations.
//!
//! Two layers of protection: a tight per-document window that stops
//! pathological rename loops on a single file, and a looser global window
//! bounding total system load. Rejection is immediate and silent to control
//! flow (logged at debug); there is no queuing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::clock::Clock;

/// One fixed rate window
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: u64,
    count: u32,
}

/// Per-key and global operation counters over a fixed window.
///
/// Windows are process-lifetime, in-memory, and never persisted.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window_ms: u64,
    max_per_key: u32,
    max_global: u32,
    keys: Mutex<HashMap<String, RateWindow>>,
    global: Mutex<Option<RateWindow>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, window_ms: u64, max_per_key: u32, max_global: u32) -> Self {
        RateLimiter {
            clock,
            window_ms,
            max_per_key,
            max_global,
            keys: Mutex::new(HashMap::new()),
            global: Mutex::new(None),
        }
    }

    /// Check whether an operation on `key` is allowed inside the current
    /// window. Counts the operation when allowed; rejection does not mutate.
    pub fn check(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let window = keys.entry(key.to_string()).or_insert(RateWindow {
            window_start: now,
            count: 0,
        });

        let allowed = Self::admit(window, now, self.window_ms, self.max_per_key);
        if !allowed {
            tracing::debug!(key, count = window.count, "rate window exhausted");
        }
        allowed
    }

    /// Check the global window shared by all documents
    pub fn check_global(&self) -> bool {
        let now = self.clock.now_ms();
        let mut global = self.global.lock().unwrap_or_else(PoisonError::into_inner);
        let window = global.get_or_insert(RateWindow {
            window_start: now,
            count: 0,
        });

        let allowed = Self::admit(window, now, self.window_ms, self.max_global);
        if !allowed {
            tracing::debug!(count = window.count, "global rate window exhausted");
        }
        allowed
    }

    fn admit(window: &mut RateWindow, now: u64, window_ms: u64, max: u32) -> bool {
        if now.saturating_sub(window.window_start) > window_ms {
            window.window_start = now;
            window.count = 1;
            return true;
        }
        if window.count >= max {
            return false;
        }
        window.count += 1;
        true
    }

    /// Drop the window for one key (used on document deletion)
    pub fn clear_key(&self, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop all windows including the global one
    pub fn clear(&self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.global.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Move a key's window to a new key after a rename
    pub fn rename_key(&self, old_key: &str, new_key: &str) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(window) = keys.remove(old_key) {
            keys.insert(new_key.to_string(), window);
        }
    }
}
