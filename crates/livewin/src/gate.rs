use crate::{source::PlaybackSurface, window::SeekWindow, SEEK_TOLERANCE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Accepted,
    /// The requested time lies outside the window. The player is expected to
    /// move to `clamped`, which comes back as a fresh seek request.
    Rejected { clamped: f64 },
}

impl SeekOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Validates seek targets against the live window.
#[derive(Debug, Clone, Copy)]
pub struct SeekGate {
    tolerance: f64,
}

impl SeekGate {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn validate(&self, window: SeekWindow, requested: f64) -> SeekOutcome {
        if requested < window.start - self.tolerance {
            tracing::warn!(
                requested,
                start = window.start,
                "Seek before the live window, clamping to its start"
            );
            SeekOutcome::Rejected {
                clamped: window.start,
            }
        } else if requested > window.end + self.tolerance {
            tracing::warn!(
                requested,
                end = window.end,
                "Seek past the live window, clamping to its end"
            );
            SeekOutcome::Rejected {
                clamped: window.end,
            }
        } else {
            SeekOutcome::Accepted
        }
    }

    /// Re-validates the position a surface resumes from, moving it into the
    /// window when it went stale during a pause.
    pub fn reconcile<S>(&self, window: SeekWindow, surface: &mut S) -> SeekOutcome
    where
        S: PlaybackSurface + ?Sized,
    {
        let outcome = self.validate(window, surface.current_time());
        if let SeekOutcome::Rejected { clamped } = outcome {
            surface.set_current_time(clamped);
        }
        outcome
    }
}

impl Default for SeekGate {
    fn default() -> Self {
        Self::new(SEEK_TOLERANCE)
    }
}
