//! One-shot cancellable timers owned by session state.
//!
//! A [`SessionTimer`] lives inside the state it guards (behind that state's
//! lock). Each schedule gets a fresh [`TimerId`]. When the timer fires, the
//! handler must lock the owning state and [`SessionTimer::claim`] its id
//! before doing anything: a cancel or reschedule that won the lock first
//! leaves nothing to claim, so the stale fire becomes a no-op.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identity of one scheduled fire.
pub type TimerId = u64;

struct Pending {
    id: TimerId,
    handle: JoinHandle<()>,
    deadline: Instant,
}

/// A single pending one-shot timer.
#[derive(Default)]
pub struct SessionTimer {
    next_id: TimerId,
    pending: Option<Pending>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, replacing (and cancelling) any pending one.
    ///
    /// `on_fire` runs on a spawned task after `delay` and receives the id it
    /// must claim.
    pub fn schedule<F, Fut>(&mut self, delay: Duration, on_fire: F) -> TimerId
    where
        F: FnOnce(TimerId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        self.next_id += 1;
        let id = self.next_id;
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(id).await;
        });

        self.pending = Some(Pending {
            id,
            handle,
            deadline,
        });
        id
    }

    /// Cancel the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Take ownership of a fire. Only succeeds for the currently pending id.
    pub fn claim(&mut self, id: TimerId) -> bool {
        match &self.pending {
            Some(pending) if pending.id == id => {
                // Dropping the handle detaches; the firing task keeps running.
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before the pending timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SessionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTimer")
            .field("pending", &self.pending.as_ref().map(|p| p.id))
            .finish()
    }
}
