use std::{fmt, future::pending, pin::Pin, time::Duration};

use tokio::time::{sleep_until, Instant, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRole {
    /// One-shot manifest refresh, armed for `max(minimumUpdatePeriod, floor)`.
    Refresh,
    /// Fixed-cadence seek window advance.
    WindowAdvance,
}

impl fmt::Display for TimerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refresh => write!(f, "refresh"),
            Self::WindowAdvance => write!(f, "window-advance"),
        }
    }
}

/// A pending deadline.
pub struct TimerHandle {
    sleep: Pin<Box<Sleep>>,
    armed_at: Instant,
}

impl TimerHandle {
    pub fn armed_at(&self) -> Instant {
        self.armed_at
    }

    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }
}

/// A single-shot timer slot. It holds at most one [`TimerHandle`] at a time.
pub struct Timer {
    role: TimerRole,
    handle: Option<TimerHandle>,
}

impl Timer {
    pub fn new(role: TimerRole) -> Self {
        Self { role, handle: None }
    }

    pub fn role(&self) -> TimerRole {
        self.role
    }

    /// Arms the timer to fire `duration` after `now`.
    ///
    /// Arming a timer that is already armed is a programming error.
    pub fn arm(&mut self, now: Instant, duration: Duration) {
        debug_assert!(self.handle.is_none(), "{} timer armed twice", self.role);
        if self.handle.is_some() {
            tracing::error!(role = %self.role, "Timer armed twice, replacing the pending handle");
        }

        self.handle = Some(TimerHandle {
            sleep: Box::pin(sleep_until(now + duration)),
            armed_at: now,
        });
    }

    /// Cancels the pending handle, if any. Returns whether something was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.handle.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.handle.as_ref().map(TimerHandle::deadline)
    }

    /// Resolves once the armed deadline passes, returning the instant the timer
    /// was armed at and leaving the slot empty. Never resolves while unarmed.
    ///
    /// Cancel safe: dropping the future keeps the pending handle in place.
    pub async fn fired(&mut self) -> Instant {
        let Some(handle) = self.handle.as_mut() else {
            return pending().await;
        };
        handle.sleep.as_mut().await;

        let armed_at = handle.armed_at;
        self.handle = None;
        armed_at
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("role", &self.role)
            .field("deadline", &self.deadline())
            .finish()
    }
}
