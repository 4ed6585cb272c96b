//! Single-flight session refresh.
//!
//! When several requests hit an expired session at once, exactly one of them
//! (the leader) calls the refresh endpoint. The others park as waiters and
//! are released with the leader's outcome. The coordinator belongs to one
//! [`ApiClient`](super::ApiClient); nothing here is global.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

/// Refreshes allowed before a successful response resets the counter.
pub const MAX_REFRESH_ATTEMPTS: u32 = 1;

/// Why a session refresh did not succeed.
///
/// Cloned to every waiter of the failed refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RefreshFailure {
    /// HTTP status of the refresh call, if it got a response.
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshFailure {
    pub(crate) fn abandoned() -> Self {
        Self {
            status: None,
            message: "session refresh was abandoned".to_string(),
        }
    }
}

type Outcome = Result<(), RefreshFailure>;

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    attempts: u32,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// What a request that saw a 401 should do next.
#[derive(Debug)]
pub enum RefreshTicket<'a> {
    /// Call the refresh endpoint, then resolve the lease.
    Leader(RefreshLease<'a>),
    /// Wait for the refresh already in flight.
    Follower(oneshot::Receiver<Outcome>),
    /// The attempt cap is reached: give up on the session.
    Exhausted,
}

/// Per-client refresh state.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the refresh in flight, start one, or report the cap.
    pub fn begin_refresh(&self) -> RefreshTicket<'_> {
        let mut state = self.state.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            return RefreshTicket::Follower(rx);
        }
        if state.attempts >= MAX_REFRESH_ATTEMPTS {
            return RefreshTicket::Exhausted;
        }
        state.in_flight = true;
        state.attempts += 1;
        RefreshTicket::Leader(RefreshLease {
            coordinator: self,
            resolved: false,
        })
    }

    /// Wait for the refresh in flight. `None` when no refresh is running.
    pub fn enqueue_waiter(&self) -> Option<oneshot::Receiver<Outcome>> {
        let mut state = self.state.lock();
        if !state.in_flight {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        Some(rx)
    }

    /// End the refresh in flight and release every waiter with `outcome`.
    /// Returns the number of waiters released.
    pub fn resolve_waiters(&self, outcome: &Outcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means its request was cancelled.
            let _ = waiter.send(outcome.clone());
        }
        count
    }

    /// Forget previous attempts after a request got through.
    pub fn reset_attempts(&self) {
        self.state.lock().attempts = 0;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }
}

/// Held by the leader while it refreshes.
///
/// Dropping the lease without resolving it (the leader's future was
/// cancelled) releases the waiters with a failure so none of them hang.
#[derive(Debug)]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    resolved: bool,
}

impl RefreshLease<'_> {
    /// Publish the refresh outcome to all waiters.
    pub fn resolve(mut self, outcome: &Outcome) -> usize {
        self.resolved = true;
        self.coordinator.resolve_waiters(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.coordinator
                .resolve_waiters(&Err(RefreshFailure::abandoned()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failure() -> RefreshFailure {
        RefreshFailure {
            status: Some(401),
            message: "refresh token expired".to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_leader_many_followers() {
        let coordinator = RefreshCoordinator::new();

        let RefreshTicket::Leader(lease) = coordinator.begin_refresh() else {
            panic!("first caller should lead");
        };
        let followers: Vec<_> = (0..3)
            .map(|_| match coordinator.begin_refresh() {
                RefreshTicket::Follower(rx) => rx,
                other => panic!("expected follower, got {other:?}"),
            })
            .collect();
        assert!(coordinator.is_refreshing());

        assert_eq!(lease.resolve(&Ok(())), 3);
        for rx in followers {
            assert_eq!(rx.await.unwrap(), Ok(()));
        }
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let RefreshTicket::Leader(lease) = coordinator.begin_refresh() else {
            panic!("first caller should lead");
        };
        let waiter = coordinator.enqueue_waiter().unwrap();

        lease.resolve(&Err(failure()));
        assert_eq!(waiter.await.unwrap(), Err(failure()));
    }

    #[test]
    fn test_attempt_cap_and_reset() {
        let coordinator = RefreshCoordinator::new();
        let RefreshTicket::Leader(lease) = coordinator.begin_refresh() else {
            panic!("first caller should lead");
        };
        lease.resolve(&Err(failure()));
        assert_eq!(coordinator.attempts(), MAX_REFRESH_ATTEMPTS);

        assert!(matches!(
            coordinator.begin_refresh(),
            RefreshTicket::Exhausted
        ));

        coordinator.reset_attempts();
        assert!(matches!(
            coordinator.begin_refresh(),
            RefreshTicket::Leader(_)
        ));
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_waiters() {
        let coordinator = RefreshCoordinator::new();
        let lease = coordinator.begin_refresh();
        let waiter = coordinator.enqueue_waiter().unwrap();

        drop(lease);
        assert_eq!(waiter.await.unwrap(), Err(RefreshFailure::abandoned()));
        assert!(coordinator.enqueue_waiter().is_none());
    }
}
