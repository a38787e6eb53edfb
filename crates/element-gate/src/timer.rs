//! Shared countdown timer.
//!
//! One deadline per outermost call: the first lock sets it, nested
//! locks observe it, and the owner clears it on the way out. Replacing
//! the deadline while locked is impossible by construction; that
//! discipline is what stops a nested wait from granting itself a fresh
//! budget.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::sleep;

/// A countdown shared by every wait inside one logical operation.
#[derive(Clone, Default)]
pub struct SharedTimer {
    deadline: Arc<Mutex<Option<Instant>>>,
}

/// RAII lock over the timer. Only the guard that actually set the
/// deadline clears it on drop.
pub struct TimerLock {
    timer: SharedTimer,
    owner: bool,
}

impl SharedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the countdown for an outermost call, or observe the
    /// enclosing deadline when one is already running. The remaining
    /// budget only ever shrinks.
    pub fn lock(&self, budget: Duration) -> TimerLock {
        let mut deadline = self.deadline.lock().unwrap();
        let owner = deadline.is_none();
        if owner {
            *deadline = Some(Instant::now() + budget);
        }
        TimerLock {
            timer: self.clone(),
            owner,
        }
    }

    /// Whether a deadline is currently running.
    pub fn is_locked(&self) -> bool {
        self.deadline.lock().unwrap().is_some()
    }

    pub fn expired(&self) -> bool {
        self.deadline
            .lock()
            .unwrap()
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(true)
    }

    /// Budget left before the deadline; zero when expired or unlocked.
    pub fn remaining(&self) -> Duration {
        self.deadline
            .lock()
            .unwrap()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Sleep one poll interval, clamped to the remaining budget.
    pub async fn pause(&self, interval: Duration) {
        let nap = interval.min(self.remaining());
        if !nap.is_zero() {
            sleep(nap).await;
        }
    }
}

impl TimerLock {
    /// Whether this guard set the deadline (outermost call).
    pub fn owner(&self) -> bool {
        self.owner
    }
}

impl Drop for TimerLock {
    fn drop(&mut self) {
        if self.owner {
            *self.timer.deadline.lock().unwrap() = None;
        }
    }
}
