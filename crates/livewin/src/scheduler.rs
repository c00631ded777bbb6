use std::time::Duration;

use tokio::time::Instant;

use crate::{
    clock::Clock,
    config::LiveConfig,
    timer::{Timer, TimerRole},
};

/// What woke the scheduler up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerEvent {
    /// The refresh timer fired. It stays unarmed until the refresh completes.
    RefreshDue,
    /// The window-advance timer fired `elapsed` seconds after it was armed.
    WindowAdvance { elapsed: f64 },
}

/// Owns the two timer roles of a live presentation.
///
/// The refresh timer bounds how stale the manifest can get even when the
/// target update time is wrong or undefined. The window-advance timer moves
/// the seek window forward every tick and asks for an early refresh once the
/// window crosses the target, rate limited by the same minimum interval.
#[derive(Debug)]
pub struct RefreshScheduler<C> {
    clock: C,
    config: LiveConfig,
    refresh_timer: Timer,
    advance_timer: Timer,
    last_fetch: Option<Instant>,
    refresh_delay: Duration,
}

impl<C: Clock> RefreshScheduler<C> {
    pub fn new(clock: C, config: LiveConfig) -> Self {
        let refresh_delay = config.refresh_delay(0.);
        Self {
            clock,
            config,
            refresh_timer: Timer::new(TimerRole::Refresh),
            advance_timer: Timer::new(TimerRole::WindowAdvance),
            last_fetch: None,
            refresh_delay,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Marks the start of a manifest fetch.
    pub fn record_fetch(&mut self) {
        self.last_fetch = Some(self.clock.now());
    }

    pub fn last_fetch(&self) -> Option<Instant> {
        self.last_fetch
    }

    /// Whether the minimum update interval has passed since the last fetch.
    pub fn min_interval_elapsed(&self) -> bool {
        match self.last_fetch {
            Some(last_fetch) => {
                self.clock.now().saturating_duration_since(last_fetch)
                    >= self.config.min_update_delay()
            }
            None => true,
        }
    }

    /// Whether the advancing window calls for a refresh ahead of the refresh timer.
    pub fn should_refresh_early(&self, window_end: f64, target: Option<f64>) -> bool {
        match target {
            Some(target) if window_end >= target => self.min_interval_elapsed(),
            _ => false,
        }
    }

    /// Replaces any pending refresh deadline with `max(min_update_period, floor)` from now.
    pub fn rearm_refresh(&mut self, min_update_period: f64) {
        self.refresh_delay = self.config.refresh_delay(min_update_period);
        self.refresh_timer.cancel();
        self.refresh_timer.arm(self.clock.now(), self.refresh_delay);
        tracing::debug!(
            delay_seconds = self.refresh_delay.as_secs_f64(),
            "Manifest refresh scheduled"
        );
    }

    /// Arms the refresh timer with the last known delay unless it is already armed.
    pub fn ensure_refresh_armed(&mut self) {
        if !self.refresh_timer.is_armed() {
            self.refresh_timer.arm(self.clock.now(), self.refresh_delay);
        }
    }

    pub fn refresh_delay(&self) -> Duration {
        self.refresh_delay
    }

    pub fn cancel_refresh(&mut self) -> bool {
        self.refresh_timer.cancel()
    }

    pub fn arm_advance(&mut self) {
        self.advance_timer
            .arm(self.clock.now(), self.config.advance_delay());
    }

    pub fn is_refresh_armed(&self) -> bool {
        self.refresh_timer.is_armed()
    }

    pub fn is_advance_armed(&self) -> bool {
        self.advance_timer.is_armed()
    }

    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.refresh_timer.deadline()
    }

    /// Cancels both timers. Safe to call on unarmed timers.
    pub fn cancel_all(&mut self) {
        self.refresh_timer.cancel();
        self.advance_timer.cancel();
    }

    /// Waits for whichever timer fires first. Never resolves while both are unarmed.
    ///
    /// Cancel safe.
    pub async fn next_event(&mut self) -> TimerEvent {
        tokio::select! {
            _ = self.refresh_timer.fired() => TimerEvent::RefreshDue,
            armed_at = self.advance_timer.fired() => TimerEvent::WindowAdvance {
                elapsed: self.clock.now().saturating_duration_since(armed_at).as_secs_f64(),
            },
        }
    }
}
