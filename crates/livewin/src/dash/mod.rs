//! # MPEG-DASH collaborators
//!
//! [`HttpManifestFetcher`] and [`DashManifestProcessor`] plug a live MPD into
//! [`RefreshCoordinator`](crate::RefreshCoordinator):
//!
//! ```no_run
//! # async fn run() -> livewin::LiveResult<()> {
//! use livewin::{
//!     dash::{DashManifestProcessor, HttpManifestFetcher},
//!     HttpClient, RefreshCoordinator,
//! };
//!
//! let client = HttpClient::default();
//! let mut coordinator = RefreshCoordinator::new(
//!     HttpManifestFetcher::new(client.clone()),
//!     DashManifestProcessor::new(client),
//! );
//! coordinator.on_seek_range_changed(|window| println!("{:.1}-{:.1}", window.start, window.end));
//! coordinator
//!     .load_initial("https://example.com/live/manifest.mpd".parse()?)
//!     .await?;
//!
//! let (handle, task) = coordinator.spawn();
//! let _ = handle.seek(0.).await?;
//! handle.teardown();
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Segment addressing
//!
//! *   `SegmentTemplate` with `SegmentTimeline`: every `S` element, including
//!     `S@r` repeats, becomes one segment reference.
//! *   `SegmentTemplate` with `@duration`: numbered segments, whose availability
//!     in a dynamic MPD is derived from `MPD@availabilityStartTime` and the
//!     origin clock synchronized through `UTCTiming`.
//!
//! Representations without a `SegmentTemplate` have no segment index and are
//! ignored by the refresh target estimation.

mod clock;
mod fetcher;
mod processor;
mod template;
mod url;

pub use clock::ServerClock;
pub use fetcher::HttpManifestFetcher;
pub use processor::DashManifestProcessor;
pub use template::Template;
