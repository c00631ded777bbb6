mod refresh;

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use livewin::{
    manifest::{Period, Stream, StreamSet},
    LiveError, LiveResult, ManifestFetcher, ManifestProcessor, ManifestSnapshot, PlaybackSurface,
    RawManifest, RefreshCoordinator, SeekWindow, SegmentIndex,
};
use url::Url;

/// Shared state of a [`ScriptedFetcher`] and a [`ScriptedProcessor`].
#[derive(Default)]
pub struct Script {
    /// Results handed out in order. The last successful snapshot is repeated
    /// once the queue runs dry.
    results: Mutex<VecDeque<LiveResult<ManifestSnapshot>>>,
    last: Mutex<Option<ManifestSnapshot>>,
    fetch_delay: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl Script {
    pub fn new(results: impl IntoIterator<Item = LiveResult<ManifestSnapshot>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn next(&self) -> LiveResult<ManifestSnapshot> {
        let next = self.results.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(Ok(snapshot)) => {
                *last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => last.clone().ok_or(LiveError::NoSegmentsAvailable),
        }
    }
}

pub struct ScriptedFetcher(pub Arc<Script>);

impl ManifestFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> LiveResult<RawManifest> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(RawManifest {
            url: url.clone(),
            body: String::new(),
        })
    }
}

pub struct ScriptedProcessor(pub Arc<Script>);

impl ManifestProcessor for ScriptedProcessor {
    async fn process(&self, _raw: RawManifest) -> LiveResult<ManifestSnapshot> {
        self.0.next()
    }
}

pub fn coordinator(script: &Arc<Script>) -> RefreshCoordinator<ScriptedFetcher, ScriptedProcessor> {
    RefreshCoordinator::new(
        ScriptedFetcher(script.clone()),
        ScriptedProcessor(script.clone()),
    )
}

pub fn manifest_url() -> Url {
    Url::parse("https://example.com/live/manifest.mpd").unwrap()
}

/// A two-stream snapshot whose streams both cover `[first_start, last_start + 10]`
/// with 10 second segments.
pub fn live_snapshot(
    first_start: f64,
    last_start: f64,
    time_shift_buffer_depth: f64,
    min_update_period: f64,
) -> ManifestSnapshot {
    let mut starts = Vec::new();
    let mut start = first_start;
    while start <= last_start {
        starts.push(start);
        start += 10.;
    }

    let stream = |id: &str| Stream {
        id: Some(id.to_string()),
        bandwidth: Some(1000),
        segment_index: Some(SegmentIndex::from_start_times(&starts, 10.)),
    };
    ManifestSnapshot {
        live: true,
        time_shift_buffer_depth,
        min_update_period,
        periods: vec![Period {
            id: Some("0".to_string()),
            start: 0.,
            stream_sets: vec![
                StreamSet {
                    content_type: Some("video".to_string()),
                    streams: vec![stream("video")],
                },
                StreamSet {
                    content_type: Some("audio".to_string()),
                    streams: vec![stream("audio")],
                },
            ],
        }],
    }
}

/// Records every window a coordinator reports.
#[derive(Clone, Default)]
pub struct WindowLog(Arc<Mutex<Vec<SeekWindow>>>);

impl WindowLog {
    pub fn observe<F, P>(&self, coordinator: &mut RefreshCoordinator<F, P>)
    where
        F: ManifestFetcher,
        P: ManifestProcessor,
    {
        let log = self.0.clone();
        coordinator.on_seek_range_changed(move |window| log.lock().unwrap().push(window));
    }

    pub fn last(&self) -> Option<SeekWindow> {
        self.0.lock().unwrap().last().copied()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// A player position shared with the test.
#[derive(Clone)]
pub struct SharedSurface(pub Arc<Mutex<f64>>);

impl SharedSurface {
    pub fn new(position: f64) -> Self {
        Self(Arc::new(Mutex::new(position)))
    }

    pub fn position(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

impl PlaybackSurface for SharedSurface {
    fn current_time(&self) -> f64 {
        self.position()
    }

    fn set_current_time(&mut self, time: f64) {
        *self.0.lock().unwrap() = time;
    }
}

pub async fn sleep_secs(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
}
