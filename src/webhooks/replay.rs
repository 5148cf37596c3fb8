//! Remembers processed webhook event ids so redeliveries are not applied twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default retention for processed ids.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const PURGE_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct ReplayGuard {
    seen: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ReplayGuard {
    pub fn new(ttl: Duration) -> Self {
        Self { seen: Arc::new(DashMap::new()), ttl }
    }

    /// Record `event_id`. Returns `false` if it was already seen within the TTL.
    pub fn first_delivery(&self, event_id: &str) -> bool {
        self.first_delivery_at(event_id, Instant::now())
    }

    pub fn first_delivery_at(&self, event_id: &str, now: Instant) -> bool {
        if self.seen.len() > PURGE_THRESHOLD {
            self.purge(now);
        }

        let ttl = self.ttl;
        let mut fresh = false;
        self.seen
            .entry(event_id.to_string())
            .and_modify(|seen_at| {
                if now.duration_since(*seen_at) > ttl {
                    *seen_at = now;
                    fresh = true;
                }
            })
            .or_insert_with(|| {
                fresh = true;
                now
            });
        fresh
    }

    /// Forget `event_id` so a redelivery is processed again.
    pub fn forget(&self, event_id: &str) {
        self.seen.remove(event_id);
    }

    pub fn purge(&self, now: Instant) {
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) <= ttl);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_within_ttl() {
        let guard = ReplayGuard::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(guard.first_delivery_at("evt_1", t0));
        assert!(!guard.first_delivery_at("evt_1", t0 + Duration::from_secs(30)));
        assert!(guard.first_delivery_at("evt_2", t0));
    }

    #[test]
    fn test_expired_ids_are_fresh_again() {
        let guard = ReplayGuard::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(guard.first_delivery_at("evt_1", t0));
        assert!(guard.first_delivery_at("evt_1", t0 + Duration::from_secs(61)));

        guard.purge(t0 + Duration::from_secs(200));
        assert!(guard.is_empty());
    }

    #[test]
    fn test_forget() {
        let guard = ReplayGuard::default();
        assert!(guard.first_delivery("evt_1"));
        guard.forget("evt_1");
        assert!(guard.first_delivery("evt_1"));
    }
}
