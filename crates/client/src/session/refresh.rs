//! Single-flight coordination for credential refresh.
//!
//! No matter how many requests hit an authorization failure at once, only
//! one of them performs the refresh call; the backend invalidates a refresh
//! token on use, so a second concurrent call would fail and log the user
//! out. Everyone else parks a continuation here and is resumed, in arrival
//! order, with whatever the one refresh produced.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// Marker error: the refresh failed terminally and the session is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpired;

/// Outcome of a refresh: the new access token, or the end of the session.
pub type RefreshResult = Result<String, SessionExpired>;

/// What the caller of [`RefreshGate::acquire`] must do next.
pub enum RefreshTicket {
    /// This caller owns the refresh. It must perform the call and report the
    /// outcome through [`RefreshGate::complete`], success or failure.
    Leader,
    /// A refresh is already in flight; await the receiver for its outcome.
    Follower(oneshot::Receiver<RefreshResult>),
}

#[derive(Default)]
struct GateState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshResult>>,
}

/// The in-flight-refresh flag plus the pending continuation queue.
///
/// Owned by the session client; never shared ambiently.
#[derive(Default)]
pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    /// Create an idle gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the refresh. The first caller while the gate is idle becomes the
    /// leader; everyone after it, until the leader completes, is queued.
    pub fn acquire(&self) -> RefreshTicket {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            RefreshTicket::Follower(rx)
        } else {
            state.in_flight = true;
            RefreshTicket::Leader
        }
    }

    /// Release the gate and resume queued continuations in arrival order.
    ///
    /// Called exactly once per leader, on both success and failure.
    pub fn complete(&self, result: &RefreshResult) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            // A dropped receiver means the caller lost interest; fine.
            let _ = waiter.send(result.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
