//! Fixed-window request governor.
//!
//! Two independent ceilings apply to every admitted request: one per
//! principal and one for the whole process. Per-principal windows live in a
//! fixed arena of shards selected by key hash; each shard has its own lock so
//! unrelated principals never contend on a single mutex. Counters are
//! in-memory only and reset on restart.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use coachgate_core::UserId;

use crate::{Denial, RateScope};

const SHARD_COUNT: usize = 64;

/// Ceiling for one window kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::minutes(1))
    }
}

/// Counter for one key in the current window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

impl RateWindow {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    fn is_elapsed(&self, window: Duration, now: DateTime<Utc>) -> bool {
        now - self.window_start >= window
    }

    /// Count one attempt. On breach returns the time until the window resets.
    fn hit(&mut self, limit: &RateLimit, now: DateTime<Utc>) -> Result<(), Duration> {
        if self.is_elapsed(limit.window, now) {
            *self = RateWindow::new(now);
        }
        self.count = self.count.saturating_add(1);
        if self.count > limit.limit {
            Err(self.window_start + limit.window - now)
        } else {
            Ok(())
        }
    }
}

/// Admission control shared by every request in the process.
pub struct RateGovernor {
    per_principal: RateLimit,
    global: RateLimit,
    shards: Box<[Mutex<HashMap<UserId, RateWindow>>]>,
    global_window: Mutex<Option<RateWindow>>,
    hasher: RandomState,
}

impl RateGovernor {
    pub fn new(per_principal: RateLimit, global: RateLimit) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            per_principal,
            global,
            shards,
            global_window: Mutex::new(None),
            hasher: RandomState::new(),
        }
    }

    /// Count one request for `principal` against both ceilings.
    ///
    /// The per-principal window is charged first; a request it rejects does
    /// not consume global budget. A request that passes it is charged to the
    /// global window, which can still reject it.
    pub fn admit(&self, principal: UserId, now: DateTime<Utc>) -> Result<(), Denial> {
        {
            let mut shard = self.shard(&principal);
            let window = shard
                .entry(principal)
                .or_insert_with(|| RateWindow::new(now));
            if let Err(retry_after) = window.hit(&self.per_principal, now) {
                return Err(Denial::RateLimited {
                    scope: RateScope::Principal,
                    retry_after,
                });
            }
        }

        let mut global = lock(&self.global_window);
        let window = global.get_or_insert_with(|| RateWindow::new(now));
        window
            .hit(&self.global, now)
            .map_err(|retry_after| Denial::RateLimited {
                scope: RateScope::Global,
                retry_after,
            })
    }

    /// Current window for `principal`, if one exists and has not elapsed.
    pub fn window_for(&self, principal: UserId, now: DateTime<Utc>) -> Option<RateWindow> {
        self.shard(&principal)
            .get(&principal)
            .filter(|w| !w.is_elapsed(self.per_principal.window, now))
            .copied()
    }

    /// Remaining admissions for `principal` in its current window.
    pub fn remaining(&self, principal: UserId, now: DateTime<Utc>) -> u32 {
        let used = self.window_for(principal, now).map_or(0, |w| w.count);
        self.per_principal.limit.saturating_sub(used)
    }

    /// Drop per-principal windows that have elapsed. Returns how many were removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let window = self.per_principal.window;
        self.shards
            .iter()
            .map(|shard| {
                let mut map = lock(shard);
                let before = map.len();
                map.retain(|_, w| !w.is_elapsed(window, now));
                before - map.len()
            })
            .sum()
    }

    /// Number of principals with a tracked window.
    pub fn tracked_principals(&self) -> usize {
        self.shards.iter().map(|s| lock(s).len()).sum()
    }

    fn shard(&self, principal: &UserId) -> MutexGuard<'_, HashMap<UserId, RateWindow>> {
        let idx = (self.hasher.hash_one(principal) as usize) % self.shards.len();
        lock(&self.shards[idx])
    }
}

// Counters remain meaningful after a panicking holder; recover the guard.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn governor(per_principal: u32, global: u32) -> RateGovernor {
        RateGovernor::new(
            RateLimit::per_minute(per_principal),
            RateLimit::per_minute(global),
        )
    }

    #[test]
    fn admits_up_to_limit_then_denies_until_window_elapses() {
        let g = governor(5, 1000);
        let p = UserId::new();
        let t0 = Utc::now();

        for _ in 0..5 {
            assert!(g.admit(p, t0).is_ok());
        }

        let denied = g.admit(p, t0 + Duration::seconds(10)).unwrap_err();
        match denied {
            Denial::RateLimited { scope, retry_after } => {
                assert_eq!(scope, RateScope::Principal);
                assert_eq!(retry_after, Duration::seconds(50));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Exactly one window later the counter resets.
        assert!(g.admit(p, t0 + Duration::minutes(1)).is_ok());
        assert_eq!(g.remaining(p, t0 + Duration::minutes(1)), 4);
    }

    #[test]
    fn principal_budget_is_independent_of_global_usage() {
        let g = governor(20, 100);
        let p = UserId::new();
        let q = UserId::new();
        let now = Utc::now();

        for _ in 0..20 {
            assert!(g.admit(p, now).is_ok());
        }
        let err = g.admit(p, now).unwrap_err();
        assert!(matches!(
            err,
            Denial::RateLimited {
                scope: RateScope::Principal,
                ..
            }
        ));

        for _ in 0..20 {
            assert!(g.admit(q, now).is_ok());
        }
    }

    #[test]
    fn global_ceiling_denies_principals_with_headroom() {
        let g = governor(10, 15);
        let now = Utc::now();
        let a = UserId::new();
        let b = UserId::new();

        for _ in 0..10 {
            g.admit(a, now).unwrap();
        }
        for _ in 0..5 {
            g.admit(b, now).unwrap();
        }

        let err = g.admit(b, now).unwrap_err();
        assert!(matches!(
            err,
            Denial::RateLimited {
                scope: RateScope::Global,
                ..
            }
        ));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn principal_denial_takes_priority_when_both_are_breached() {
        let g = governor(2, 2);
        let p = UserId::new();
        let now = Utc::now();
        g.admit(p, now).unwrap();
        g.admit(p, now).unwrap();

        let err = g.admit(p, now).unwrap_err();
        assert!(matches!(
            err,
            Denial::RateLimited {
                scope: RateScope::Principal,
                ..
            }
        ));
    }

    #[test]
    fn concurrent_admissions_never_lose_updates() {
        let g = Arc::new(governor(1_000, 1_000_000));
        let p = UserId::new();
        let now = Utc::now();
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = g.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        if g.admit(p, now).is_ok() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 1_000);
        assert_eq!(g.window_for(p, now).unwrap().count, 2_000);
    }

    #[test]
    fn prune_drops_only_elapsed_windows() {
        let g = governor(5, 100);
        let now = Utc::now();
        let stale = UserId::new();
        let fresh = UserId::new();
        g.admit(stale, now - Duration::minutes(2)).unwrap();
        g.admit(fresh, now).unwrap();

        assert_eq!(g.prune_expired(now), 1);
        assert_eq!(g.tracked_principals(), 1);
        assert!(g.window_for(fresh, now).is_some());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: `limit` calls in one window are admitted, the next is
            /// denied with a positive retry hint, and the window resets after
            /// `window` elapses.
            #[test]
            fn limit_admitted_then_denied_then_reset(
                limit in 1u32..200,
                window_secs in 1i64..3_600,
                offset_ms in 0i64..1_000,
            ) {
                let window = Duration::seconds(window_secs);
                let g = RateGovernor::new(RateLimit::new(limit, window), RateLimit::new(u32::MAX, window));
                let p = UserId::new();
                let t0 = Utc::now();
                let within = t0 + Duration::milliseconds(offset_ms.min(window_secs * 1000 - 1));

                for _ in 0..limit {
                    prop_assert!(g.admit(p, t0).is_ok());
                }
                let denied = g.admit(p, within).unwrap_err();
                prop_assert!(denied.retry_after().unwrap() > Duration::zero());

                prop_assert!(g.admit(p, t0 + window).is_ok());
            }
        }
    }
}
