//! Per-(actor, organization) invitation rate limiting.
//!
//! Fixed-window counters persisted through the record store so every
//! instance shares the same budget. The read-then-write gap means a burst
//! can slightly overshoot the cap; acceptable for an abuse brake.

use chrono::{Duration, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::NewInviteWindow;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq)]
pub enum InviteGate {
    Allowed,
    Denied { retry_after_secs: u64 },
}

#[derive(Clone)]
pub struct InviteRateLimiter {
    max_per_window: i32,
    window_secs: i64,
}

impl InviteRateLimiter {
    pub fn new(max_per_window: i32, window_secs: i64) -> Self {
        Self {
            max_per_window,
            window_secs,
        }
    }

    /// Checks the active window for (actor, organization) and counts this
    /// attempt if allowed. Store failures fail open: a broken counter must
    /// not block legitimate invitations, so the attempt is allowed and the
    /// degradation logged.
    pub fn check_and_increment(
        &self,
        store: &dyn RecordStore,
        actor_id: Uuid,
        organization_id: Uuid,
    ) -> InviteGate {
        let now = Utc::now().naive_utc();
        let since = now - Duration::seconds(self.window_secs);

        let window = match store.find_invite_window(actor_id, organization_id, since) {
            Ok(window) => window,
            Err(err) => {
                warn!(
                    actor_id = %actor_id,
                    organization_id = %organization_id,
                    error = %err,
                    "Invite rate limit check failed, allowing request"
                );
                return InviteGate::Allowed;
            }
        };

        match window {
            None => {
                if let Err(err) = store.insert_invite_window(NewInviteWindow {
                    actor_id,
                    organization_id,
                    invite_count: 1,
                    window_start: now,
                }) {
                    warn!(
                        actor_id = %actor_id,
                        error = %err,
                        "Failed to open invite window, allowing request"
                    );
                }
                InviteGate::Allowed
            }
            Some(window) if window.invite_count < self.max_per_window => {
                if let Err(err) = store.increment_invite_window(window.id) {
                    warn!(
                        actor_id = %actor_id,
                        error = %err,
                        "Failed to count invite, allowing request"
                    );
                }
                InviteGate::Allowed
            }
            Some(window) => InviteGate::Denied {
                retry_after_secs: self.retry_after(window.window_start, now),
            },
        }
    }

    fn retry_after(&self, window_start: NaiveDateTime, now: NaiveDateTime) -> u64 {
        let rolls_at = window_start + Duration::seconds(self.window_secs);
        (rolls_at - now).num_seconds().max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn limiter() -> InviteRateLimiter {
        InviteRateLimiter::new(3, 3600)
    }

    #[test]
    fn test_allows_until_cap() {
        let store = MemoryStore::new();
        let limiter = limiter();
        let actor = Uuid::new_v4();
        let org = Uuid::new_v4();

        for _ in 0..3 {
            assert_eq!(
                limiter.check_and_increment(&store, actor, org),
                InviteGate::Allowed
            );
        }
        match limiter.check_and_increment(&store, actor, org) {
            InviteGate::Denied { retry_after_secs } => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 3600);
            }
            InviteGate::Allowed => panic!("expected denial at cap"),
        }
    }

    #[test]
    fn test_denied_attempt_does_not_consume_budget() {
        let store = MemoryStore::new();
        let limiter = limiter();
        let actor = Uuid::new_v4();
        let org = Uuid::new_v4();

        for _ in 0..3 {
            limiter.check_and_increment(&store, actor, org);
        }
        for _ in 0..5 {
            assert!(matches!(
                limiter.check_and_increment(&store, actor, org),
                InviteGate::Denied { .. }
            ));
        }
    }

    #[test]
    fn test_budgets_are_scoped_per_pair() {
        let store = MemoryStore::new();
        let limiter = limiter();
        let actor = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();

        for _ in 0..3 {
            limiter.check_and_increment(&store, actor, org_a);
        }
        assert!(matches!(
            limiter.check_and_increment(&store, actor, org_a),
            InviteGate::Denied { .. }
        ));
        assert_eq!(
            limiter.check_and_increment(&store, actor, org_b),
            InviteGate::Allowed
        );
    }

    #[test]
    fn test_window_rollover_resets_budget() {
        let store = MemoryStore::new();
        let limiter = limiter();
        let actor = Uuid::new_v4();
        let org = Uuid::new_v4();

        for _ in 0..3 {
            limiter.check_and_increment(&store, actor, org);
        }
        store.rewind_invite_windows(chrono::Duration::seconds(3601));
        assert_eq!(
            limiter.check_and_increment(&store, actor, org),
            InviteGate::Allowed
        );
    }

    #[test]
    fn test_fails_open_on_store_outage() {
        let store = MemoryStore::new();
        store.fail_invite_windows(true);
        assert_eq!(
            limiter().check_and_increment(&store, Uuid::new_v4(), Uuid::new_v4()),
            InviteGate::Allowed
        );
    }
}
