//! Global request-in-flight indicator.

use std::sync::Arc;

use tokio::sync::watch;

/// Number of API requests currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub in_flight: usize,
}

impl LoadingState {
    #[must_use]
    pub const fn is_loading(self) -> bool {
        self.in_flight > 0
    }
}

/// Observable loading state. Every API request holds a [`LoadingGuard`]
/// while it runs.
#[derive(Debug, Clone)]
pub struct LoadingIndicator {
    tx: Arc<watch::Sender<LoadingState>>,
}

impl Default for LoadingIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingIndicator {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LoadingState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Mark one request as started until the guard is dropped.
    #[must_use]
    pub fn begin(&self) -> LoadingGuard {
        self.tx.send_modify(|state| state.in_flight += 1);
        LoadingGuard {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LoadingState {
        *self.tx.borrow()
    }

    /// Receive every change of the loading state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.tx.subscribe()
    }
}

/// Keeps a request counted as in flight.
#[derive(Debug)]
pub struct LoadingGuard {
    tx: Arc<watch::Sender<LoadingState>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.tx
            .send_modify(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_count_requests() {
        let indicator = LoadingIndicator::new();
        let rx = indicator.subscribe();
        assert!(!indicator.state().is_loading());

        let first = indicator.begin();
        let second = indicator.begin();
        assert_eq!(rx.borrow().in_flight, 2);

        drop(first);
        assert!(indicator.state().is_loading());
        drop(second);
        assert!(!rx.borrow().is_loading());
    }
}
