pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dash;
pub mod error;
pub mod gate;
pub mod manifest;
pub mod scheduler;
pub mod source;
pub mod target;
pub mod timer;
pub mod window;

mod util;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::LiveConfig;
pub use coordinator::{LiveHandle, RefreshCoordinator};
pub use error::{LiveError, LiveResult};
pub use gate::{SeekGate, SeekOutcome};
pub use manifest::{ManifestSnapshot, SegmentIndex, SegmentReference};
pub use source::{ManifestFetcher, ManifestProcessor, PlaybackSurface, RawManifest};
pub use util::http::HttpClient;
pub use window::{SeekWindow, SeekWindowTracker};

/// Lower bound between two manifest fetches, in seconds.
pub const MIN_UPDATE_INTERVAL: f64 = 3.0;

/// Cadence of the window-advance timer, in seconds.
pub const ADVANCE_INTERVAL: f64 = 1.0;

/// Time subtracted from the target update time to cover the manifest round trip.
pub const NETWORK_LATENCY: f64 = 2.0;

/// Rounding tolerance applied to both window edges on seek validation.
pub const SEEK_TOLERANCE: f64 = 0.01;
