//! Single-flight coordination of access-token refreshes.
//!
//! The first request to observe a 401 becomes the leader and performs the
//! refresh; every request that observes a 401 while that refresh is in flight
//! parks a oneshot receiver in the queue. Settling drains the queue in
//! enqueue order, each waiter exactly once, and returns the state to idle.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use super::errors::ClientError;

/// New access token, or the error the refresh failed with.
pub type RefreshOutcome = Result<String, ClientError>;

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

pub enum Ticket<'a> {
    /// No refresh was in flight; the holder must perform it and settle.
    Lead(RefreshLease<'a>),
    /// A refresh is already in flight; await its outcome.
    Wait(Waiter),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-set in one critical section: either start a refresh cycle
    /// or join the one in flight.
    pub fn acquire_or_wait(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if let State::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Ticket::Wait(Waiter(rx));
        }
        *state = State::Refreshing {
            waiters: Vec::new(),
        };
        Ticket::Lead(RefreshLease {
            coordinator: self,
            settled: false,
        })
    }

    /// Fan `outcome` out to every queued waiter and return to idle.
    /// Returns how many waiters were drained; settling while idle is a no-op.
    pub fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = match std::mem::take(&mut *self.lock()) {
            State::Idle => return 0,
            State::Refreshing { waiters } => waiters,
        };
        let drained = waiters.len();
        for waiter in waiters {
            // A waiter whose request was dropped has nobody listening.
            let _ = waiter.send(outcome.clone());
        }
        drained
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), State::Refreshing { .. })
    }

    /// Number of requests parked behind the in-flight refresh.
    pub fn pending(&self) -> usize {
        match &*self.lock() {
            State::Idle => 0,
            State::Refreshing { waiters } => waiters.len(),
        }
    }
}

/// Held by the leader of a refresh cycle. Dropping it unsettled (for example
/// when the leader's future is cancelled) fails the waiters instead of
/// stranding them.
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(Err(ClientError::refresh_failed("refresh abandoned")));
        }
    }
}

pub struct Waiter(oneshot::Receiver<RefreshOutcome>);

impl Waiter {
    pub async fn wait(self) -> RefreshOutcome {
        self.0
            .await
            .unwrap_or_else(|_| Err(ClientError::refresh_failed("refresh abandoned")))
    }
}
