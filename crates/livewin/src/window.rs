/// The `[start, end]` range currently eligible for seeking, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekWindow {
    pub start: f64,
    pub end: f64,
}

impl SeekWindow {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// Owns the live seek window and moves it along with wall-clock time.
///
/// The window grows from its initial width until it reaches the time shift
/// buffer depth, then slides forward at wall-clock rate.
#[derive(Debug, Default)]
pub struct SeekWindowTracker {
    window: Option<SeekWindow>,
    time_shift_buffer_depth: f64,
}

impl SeekWindowTracker {
    pub fn new(time_shift_buffer_depth: f64) -> Self {
        Self {
            window: None,
            time_shift_buffer_depth,
        }
    }

    /// Seeds a live window from the limits every stream can serve.
    ///
    /// The start never precedes the first available segment.
    pub fn initialize_live(&mut self, streams_start: f64, streams_end: f64) {
        let start = (streams_end - self.time_shift_buffer_depth).max(streams_start);
        self.initialize(start, streams_end);
    }

    pub fn initialize(&mut self, start: f64, end: f64) {
        debug_assert!(self.window.is_none(), "seek window initialized twice");
        debug_assert!(end >= start, "seek window end {end} before start {start}");
        if self.window.is_some() {
            tracing::error!(start, end, "Seek window already initialized, ignoring");
            return;
        }

        self.window = Some(SeekWindow {
            start,
            end: end.max(start),
        });
        tracing::debug!(start, end, "Seek window initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.window.is_some()
    }

    pub fn time_shift_buffer_depth(&self) -> f64 {
        self.time_shift_buffer_depth
    }

    /// Takes the depth of a refreshed manifest. The window itself is not
    /// reshaped, it converges on the next advances.
    pub fn set_time_shift_buffer_depth(&mut self, depth: f64) {
        self.time_shift_buffer_depth = depth.max(0.);
    }

    /// Moves the window by `elapsed` seconds of wall-clock time.
    pub fn advance(&mut self, elapsed: f64) {
        debug_assert!(elapsed >= 0., "negative elapsed time {elapsed}");
        let Some(window) = self.window.as_mut() else {
            debug_assert!(false, "seek window advanced before initialization");
            tracing::error!("Seek window advanced before initialization, ignoring");
            return;
        };

        let elapsed = elapsed.max(0.);
        if window.width() + elapsed > self.time_shift_buffer_depth {
            window.start += elapsed;
        }
        window.end += elapsed;
    }

    pub fn current(&self) -> Option<SeekWindow> {
        self.window
    }
}
