//! Idle tracking for in-memory session expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks when each cached session was last used.
///
/// Every method has an `_at` form taking an explicit instant so callers
/// can reason about a single "now" across several checks.
#[derive(Debug)]
pub struct IdleTracker {
    last_used: HashMap<String, Instant>,
    idle_ttl: Option<Duration>,
}

impl IdleTracker {
    /// Create a tracker. `None` disables idle expiry.
    pub fn new(idle_ttl: Option<Duration>) -> Self {
        Self {
            last_used: HashMap::new(),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    /// Record a use now.
    pub fn touch(&mut self, session_id: &str) {
        self.touch_at(session_id, Instant::now());
    }

    pub fn touch_at(&mut self, session_id: &str, at: Instant) {
        self.last_used.insert(session_id.to_string(), at);
    }

    /// Whether the session has been idle longer than the TTL.
    ///
    /// Untracked sessions are never idle; the cache decides membership.
    pub fn is_idle(&self, session_id: &str) -> bool {
        self.is_idle_at(session_id, Instant::now())
    }

    pub fn is_idle_at(&self, session_id: &str, now: Instant) -> bool {
        match (self.idle_ttl, self.last_used.get(session_id)) {
            (Some(ttl), Some(last)) => now.saturating_duration_since(*last) > ttl,
            _ => false,
        }
    }

    pub fn remove(&mut self, session_id: &str) {
        self.last_used.remove(session_id);
    }

    /// Stop tracking every idle session and return their ids.
    pub fn drain_idle_at(&mut self, now: Instant) -> Vec<String> {
        let Some(ttl) = self.idle_ttl else {
            return Vec::new();
        };

        let idle: Vec<String> = self
            .last_used
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &idle {
            self.last_used.remove(id);
        }
        idle
    }

    pub fn len(&self) -> usize {
        self.last_used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_used.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_used.clear();
    }
}
