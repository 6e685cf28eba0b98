use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Per-window request quota.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    /// Maximum requests allowed inside one window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Quota {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(3600),
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    /// Rejected; seconds until the current window resets.
    Rejected { retry_after: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Counter state for one (scope, client) key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    pub count: u32,
    pub window_reset_at: SystemTime,
}

/// Wall clock abstraction so tests can drive time explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Production clock. Correctness assumes wall-clock monotonicity; there is
/// no guard against clock skew.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Result of one per-key update: either the new state to persist, or a
/// rejection that leaves the stored state untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreUpdate {
    Store(WindowState),
    Reject { retry_after: u64 },
}

/// Backing store for the counters. Injected so tests get a fresh store per
/// case and a multi-instance deployment can swap in a shared one without
/// touching call sites.
///
/// `update` must be atomic per key: the closure runs under the store's
/// per-key lock, so two concurrent checks for the same key can never
/// interleave the read and the write.
pub trait RateLimitStore: Send + Sync {
    fn update(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<WindowState>) -> StoreUpdate,
    ) -> StoreUpdate;
    fn reset(&self, key: &str);
}

/// Process-local store. Stale keys are never evicted; the key set grows for
/// the process lifetime, which is acceptable for short-lived instances.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, WindowState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn update(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<WindowState>) -> StoreUpdate,
    ) -> StoreUpdate {
        // The entry guard holds the shard lock for the whole
        // read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let outcome = decide(Some(*entry.get()));
                if let StoreUpdate::Store(state) = outcome {
                    entry.insert(state);
                }
                outcome
            }
            Entry::Vacant(entry) => {
                let outcome = decide(None);
                if let StoreUpdate::Store(state) = outcome {
                    entry.insert(state);
                }
                outcome
            }
        }
    }

    fn reset(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Fixed-window rate limiter keyed by `(scope, client)`.
///
/// Invariant: within an active window, the counter for a key never exceeds
/// the quota maximum; once it reaches the maximum every further check is
/// rejected without mutating state, until the window expires.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    fn make_key(scope: &str, client: &str) -> String {
        format!("{}::{}", scope, client)
    }

    /// Check and account one request for `(scope, client)` under `quota`.
    pub fn check(&self, scope: &str, client: &str, quota: Quota) -> Decision {
        let key = Self::make_key(scope, client);
        let now = self.clock.now();

        let outcome = self.store.update(&key, &mut |current| match current {
            Some(state) if now <= state.window_reset_at => {
                if state.count >= quota.max_requests {
                    // Rejection does not touch the stored state.
                    StoreUpdate::Reject {
                        retry_after: seconds_until(state.window_reset_at, now),
                    }
                } else {
                    StoreUpdate::Store(WindowState {
                        count: state.count + 1,
                        window_reset_at: state.window_reset_at,
                    })
                }
            }
            // Expired or absent: start a fresh window with this request
            // counted.
            _ => StoreUpdate::Store(WindowState {
                count: 1,
                window_reset_at: now + quota.window,
            }),
        });

        match outcome {
            StoreUpdate::Store(_) => Decision::Allowed,
            StoreUpdate::Reject { retry_after } => Decision::Rejected { retry_after },
        }
    }

    /// Drop the counter for a key (admin/testing hook).
    pub fn clear(&self, scope: &str, client: &str) {
        self.store.reset(&Self::make_key(scope, client));
    }
}

/// Whole seconds until `reset_at`, rounded up so a freshly exhausted 60s
/// window reports 60 and never 59.
fn seconds_until(reset_at: SystemTime, now: SystemTime) -> u64 {
    let remaining = reset_at
        .duration_since(now)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64;
    remaining.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::UNIX_EPOCH;

    struct FakeClock {
        now: Mutex<SystemTime>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            }
        }

        fn advance(&self, d: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += d;
        }
    }

    impl Clock for Arc<FakeClock> {
        fn now(&self) -> SystemTime {
            *self.now.lock().unwrap()
        }
    }

    fn limiter_with_clock(clock: Arc<FakeClock>) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), Arc::new(clock))
    }

    #[test]
    fn allows_up_to_max_then_rejects() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock.clone());
        let quota = Quota::per_minute(10);

        for _ in 0..10 {
            assert!(limiter.check("search", "1.2.3.4", quota).is_allowed());
        }

        match limiter.check("search", "1.2.3.4", quota) {
            Decision::Rejected { retry_after } => assert_eq!(retry_after, 60),
            Decision::Allowed => panic!("11th call must be rejected"),
        }

        // Rejection does not mutate state; still rejected.
        assert!(!limiter.check("search", "1.2.3.4", quota).is_allowed());
    }

    #[test]
    fn fresh_window_admits_again() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock.clone());
        let quota = Quota::per_minute(2);

        assert!(limiter.check("search", "c", quota).is_allowed());
        assert!(limiter.check("search", "c", quota).is_allowed());
        assert!(!limiter.check("search", "c", quota).is_allowed());

        clock.advance(Duration::from_secs(61));
        assert!(limiter.check("search", "c", quota).is_allowed());
        assert!(limiter.check("search", "c", quota).is_allowed());
        assert!(!limiter.check("search", "c", quota).is_allowed());
    }

    #[test]
    fn retry_after_shrinks_as_window_ages() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock.clone());
        let quota = Quota::per_minute(1);

        assert!(limiter.check("current", "c", quota).is_allowed());
        clock.advance(Duration::from_secs(45));

        match limiter.check("current", "c", quota) {
            Decision::Rejected { retry_after } => assert_eq!(retry_after, 15),
            Decision::Allowed => panic!("over quota"),
        }
    }

    #[test]
    fn retry_after_rounds_partial_seconds_up() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock.clone());
        let quota = Quota::per_minute(1);

        assert!(limiter.check("search", "c", quota).is_allowed());
        clock.advance(Duration::from_millis(350));

        // 59.65s remain in the window; the header must still say 60.
        match limiter.check("search", "c", quota) {
            Decision::Rejected { retry_after } => assert_eq!(retry_after, 60),
            Decision::Allowed => panic!("over quota"),
        }
    }

    #[test]
    fn concurrent_checks_admit_exactly_the_quota() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Barrier;

        let limiter = RateLimiter::in_memory();
        let quota = Quota::per_minute(1);

        for round in 0..25 {
            let admitted = AtomicU32::new(0);
            let barrier = Barrier::new(8);

            std::thread::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|| {
                        barrier.wait();
                        if limiter.check("search", "10.0.0.9", quota).is_allowed() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(admitted.load(Ordering::SeqCst), 1, "round {}", round);
            limiter.clear("search", "10.0.0.9");
        }
    }

    #[test]
    fn scopes_and_clients_are_independent() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock);
        let quota = Quota::per_minute(1);

        assert!(limiter.check("search", "a", quota).is_allowed());
        assert!(!limiter.check("search", "a", quota).is_allowed());

        // Different client, same scope.
        assert!(limiter.check("search", "b", quota).is_allowed());
        // Same client, different scope.
        assert!(limiter.check("geocode", "a", quota).is_allowed());
    }

    #[test]
    fn hourly_quota_uses_hour_window() {
        let clock = Arc::new(FakeClock::new());
        let limiter = limiter_with_clock(clock.clone());
        let quota = Quota::per_hour(1);

        assert!(limiter.check("proxy:openai", "c", quota).is_allowed());
        clock.advance(Duration::from_secs(3599));
        assert!(!limiter.check("proxy:openai", "c", quota).is_allowed());
        clock.advance(Duration::from_secs(2));
        assert!(limiter.check("proxy:openai", "c", quota).is_allowed());
    }
}
