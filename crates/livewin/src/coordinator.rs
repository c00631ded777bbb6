use std::{future::pending, sync::Arc};

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use url::Url;

use crate::{
    clock::{Clock, TokioClock},
    config::LiveConfig,
    error::{LiveError, LiveResult},
    gate::{SeekGate, SeekOutcome},
    manifest::ManifestSnapshot,
    scheduler::{RefreshScheduler, TimerEvent},
    source::{ManifestFetcher, ManifestProcessor, PlaybackSurface},
    target::TargetTimeEstimator,
    window::{SeekWindow, SeekWindowTracker},
};

type RefreshFuture = BoxFuture<'static, LiveResult<ManifestSnapshot>>;
type SeekRangeObserver = Box<dyn Fn(SeekWindow) + Send + Sync>;
type ManifestObserver = Box<dyn Fn(&Arc<ManifestSnapshot>) + Send + Sync>;

/// Drives the fetch → process → apply cycle of a live manifest.
///
/// ```text
/// load_initial ──► seed window ──► arm refresh timer ──┐
///                              └─► arm advance timer   │
///                                                      ▼
/// ┌──────────────────────────── run() ─────────────────────────────┐
/// │ select! {                                                      │
/// │   refresh timer fired   ─► start refresh (unless in flight)    │
/// │   advance timer fired   ─► advance window                      │
/// │                            end >= target && 3s since fetch     │
/// │                              ─► start refresh                  │
/// │                            notify, re-arm                      │
/// │   in-flight refresh done ─► replace snapshot, re-arm refresh   │
/// │   command               ─► seek / resume / refresh / teardown  │
/// │ }                                                              │
/// └────────────────────────────────────────────────────────────────┘
/// ```
///
/// Everything runs on one task, so a completed refresh is always applied
/// before the next timer callback observes the window or the target.
pub struct RefreshCoordinator<F, P, C = TokioClock> {
    fetcher: Arc<F>,
    processor: Arc<P>,
    manifest_url: Option<Url>,

    snapshot: Option<Arc<ManifestSnapshot>>,
    target: Option<f64>,
    tracker: SeekWindowTracker,
    estimator: TargetTimeEstimator,
    scheduler: RefreshScheduler<C>,
    gate: SeekGate,

    /// At most one manifest fetch at a time.
    in_flight: Option<RefreshFuture>,
    alive: bool,

    surface: Option<Box<dyn PlaybackSurface>>,
    seek_range_observers: Vec<SeekRangeObserver>,
    manifest_observers: Vec<ManifestObserver>,
}

impl<F, P> RefreshCoordinator<F, P, TokioClock>
where
    F: ManifestFetcher,
    P: ManifestProcessor,
{
    pub fn new(fetcher: F, processor: P) -> Self {
        Self::with_clock(fetcher, processor, TokioClock, LiveConfig::default())
    }
}

impl<F, P, C> RefreshCoordinator<F, P, C>
where
    F: ManifestFetcher,
    P: ManifestProcessor,
    C: Clock,
{
    pub fn with_clock(fetcher: F, processor: P, clock: C, config: LiveConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            processor: Arc::new(processor),
            manifest_url: None,
            snapshot: None,
            target: None,
            tracker: SeekWindowTracker::default(),
            estimator: TargetTimeEstimator::new(config.network_latency),
            scheduler: RefreshScheduler::new(clock, config),
            gate: SeekGate::new(config.seek_tolerance),
            in_flight: None,
            alive: false,
            surface: None,
            seek_range_observers: Vec::new(),
            manifest_observers: Vec::new(),
        }
    }

    /// Registers a callback invoked with the window whenever it changes.
    pub fn on_seek_range_changed<O>(&mut self, observer: O)
    where
        O: Fn(SeekWindow) + Send + Sync + 'static,
    {
        self.seek_range_observers.push(Box::new(observer));
    }

    /// Registers a callback invoked with every snapshot that replaces the current one.
    pub fn on_manifest_updated<O>(&mut self, observer: O)
    where
        O: Fn(&Arc<ManifestSnapshot>) + Send + Sync + 'static,
    {
        self.manifest_observers.push(Box::new(observer));
    }

    /// Attaches the player whose position is re-validated when playback resumes.
    pub fn attach_surface<S>(&mut self, surface: S)
    where
        S: PlaybackSurface + 'static,
    {
        self.surface = Some(Box::new(surface));
    }

    pub fn snapshot(&self) -> Option<&Arc<ManifestSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn window(&self) -> Option<SeekWindow> {
        self.tracker.current()
    }

    pub fn target_update_time(&self) -> Option<f64> {
        self.target
    }

    pub fn scheduler(&self) -> &RefreshScheduler<C> {
        &self.scheduler
    }

    pub fn is_live(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.live)
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn refresh_future(&self, url: Url) -> RefreshFuture {
        let fetcher = self.fetcher.clone();
        let processor = self.processor.clone();
        Box::pin(async move {
            let raw = fetcher.fetch(&url).await?;
            processor.process(raw).await
        })
    }

    /// Fetches and applies the first manifest, seeds the seek window and, for
    /// live content, arms both timers.
    pub async fn load_initial(&mut self, url: Url) -> LiveResult<Arc<ManifestSnapshot>> {
        tracing::info!(%url, "Loading manifest");
        self.scheduler.record_fetch();

        let snapshot = self.refresh_future(url.clone()).await?;
        let (streams_start, streams_end) = snapshot
            .stream_limits()
            .ok_or(LiveError::NoSegmentsAvailable)?;
        self.manifest_url = Some(url);

        let snapshot = self.replace_snapshot(snapshot);
        if snapshot.live {
            self.tracker.initialize_live(streams_start, streams_end);
            self.scheduler.rearm_refresh(snapshot.min_update_period);
            self.scheduler.arm_advance();
        } else {
            self.tracker.initialize(streams_start, streams_end);
        }
        self.alive = true;

        tracing::info!(
            live = snapshot.live,
            time_shift_buffer_depth = snapshot.time_shift_buffer_depth,
            target_update_time = ?self.target,
            "Manifest loaded"
        );
        self.notify_seek_range();
        Ok(snapshot)
    }

    /// Fetches and applies a new manifest right away, waiting for it.
    ///
    /// Fails with [`LiveError::RefreshInFlight`] while another refresh is pending.
    pub async fn refresh_now(&mut self) -> LiveResult<()> {
        if self.in_flight.is_some() {
            return Err(LiveError::RefreshInFlight);
        }
        let url = self.manifest_url.clone().ok_or(LiveError::NotLoaded)?;
        if !self.alive {
            return Err(LiveError::SessionClosed);
        }

        self.scheduler.cancel_refresh();
        self.scheduler.record_fetch();
        let result = self.refresh_future(url).await;
        self.complete_refresh(result)
    }

    /// Starts a refresh without waiting for it. The result is applied by [`Self::run`].
    fn start_refresh(&mut self, reason: &'static str) -> LiveResult<()> {
        if self.in_flight.is_some() {
            tracing::debug!(reason, "Manifest refresh already in flight, skipping");
            return Err(LiveError::RefreshInFlight);
        }
        let url = self.manifest_url.clone().ok_or(LiveError::NotLoaded)?;

        tracing::debug!(reason, "Refreshing manifest");
        self.scheduler.cancel_refresh();
        self.scheduler.record_fetch();
        self.in_flight = Some(self.refresh_future(url));
        Ok(())
    }

    /// Applies the outcome of a refresh fetch.
    ///
    /// A failure keeps the current snapshot and, while the presentation is
    /// live, re-arms the refresh timer with the last delay so a later refresh
    /// is still pending.
    fn complete_refresh(&mut self, result: LiveResult<ManifestSnapshot>) -> LiveResult<()> {
        if !self.alive {
            tracing::debug!("Manifest refresh finished after teardown, ignoring");
            return Ok(());
        }

        match result {
            Ok(snapshot) => {
                let snapshot = self.replace_snapshot(snapshot);
                if snapshot.live {
                    self.scheduler.rearm_refresh(snapshot.min_update_period);
                } else {
                    tracing::info!("Presentation is no longer live, stopping manifest refresh");
                    self.scheduler.cancel_all();
                }
                self.notify_seek_range();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Manifest refresh failed, keeping the previous manifest");
                if self.is_live() {
                    self.scheduler.ensure_refresh_armed();
                }
                Err(e)
            }
        }
    }

    fn replace_snapshot(&mut self, snapshot: ManifestSnapshot) -> Arc<ManifestSnapshot> {
        self.tracker
            .set_time_shift_buffer_depth(snapshot.time_shift_buffer_depth);
        self.target = self.estimator.estimate(&snapshot);
        tracing::debug!(target_update_time = ?self.target, "Target update time computed");

        let snapshot = Arc::new(snapshot);
        self.snapshot = Some(snapshot.clone());
        for observer in &self.manifest_observers {
            observer(&snapshot);
        }
        snapshot
    }

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::RefreshDue => {
                _ = self.start_refresh("refresh timer fired");
            }
            TimerEvent::WindowAdvance { elapsed } => self.on_window_advance(elapsed),
        }
    }

    fn on_window_advance(&mut self, elapsed: f64) {
        self.tracker.advance(elapsed);

        if let Some(window) = self.tracker.current() {
            if self.in_flight.is_none()
                && self.scheduler.should_refresh_early(window.end, self.target)
            {
                _ = self.start_refresh("seek window crossed target update time");
            }
        }

        self.notify_seek_range();
        self.scheduler.arm_advance();
    }

    fn notify_seek_range(&self) {
        let Some(window) = self.tracker.current() else {
            return;
        };
        tracing::trace!(start = window.start, end = window.end, "Seek range changed");
        for observer in &self.seek_range_observers {
            observer(window);
        }
    }

    /// Validates a seek the player is about to commit.
    ///
    /// Seeks are accepted unchanged until the window exists.
    pub fn on_seek_requested(&self, time: f64) -> SeekOutcome {
        match self.tracker.current() {
            Some(window) => self.gate.validate(window, time),
            None => SeekOutcome::Accepted,
        }
    }

    /// Treats the attached surface's position like a fresh seek request.
    pub fn on_playback_resumed(&mut self) -> Option<SeekOutcome> {
        let window = self.tracker.current()?;
        let surface = self.surface.as_mut()?;
        Some(self.gate.reconcile(window, surface.as_mut()))
    }

    /// Cancels both timers and drops any in-flight refresh.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.scheduler.cancel_all();
        self.in_flight = None;
        tracing::info!("Live session torn down");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Seek { time, reply } => {
                _ = reply.send(self.on_seek_requested(time));
            }
            Command::PlaybackResumed { reply } => {
                _ = reply.send(self.on_playback_resumed());
            }
            Command::Window { reply } => {
                _ = reply.send(self.tracker.current());
            }
            Command::Refresh { reply } => {
                _ = reply.send(self.start_refresh("refresh requested"));
            }
            Command::Teardown => self.teardown(),
        }
    }

    /// Runs timers, refresh completions and commands until teardown, or until
    /// every [`LiveHandle`] is dropped.
    ///
    /// Returns right away unless [`Self::load_initial`] succeeded first.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while self.alive {
            tokio::select! {
                event = self.scheduler.next_event() => self.on_timer(event),
                result = wait_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    _ = self.complete_refresh(result);
                }
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => self.teardown(),
                },
            }
        }
    }

    /// Moves the coordinator onto its own task.
    pub fn spawn(self) -> (LiveHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        (LiveHandle { commands: sender }, task)
    }
}

async fn wait_in_flight(in_flight: &mut Option<RefreshFuture>) -> LiveResult<ManifestSnapshot> {
    match in_flight {
        Some(refresh) => refresh.await,
        None => pending().await,
    }
}

pub enum Command {
    Seek {
        time: f64,
        reply: oneshot::Sender<SeekOutcome>,
    },
    PlaybackResumed {
        reply: oneshot::Sender<Option<SeekOutcome>>,
    },
    Window {
        reply: oneshot::Sender<Option<SeekWindow>>,
    },
    Refresh {
        reply: oneshot::Sender<LiveResult<()>>,
    },
    Teardown,
}

/// Cloneable access to a spawned [`RefreshCoordinator`].
#[derive(Clone)]
pub struct LiveHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl LiveHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> LiveResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| LiveError::SessionClosed)?;
        response.await.map_err(|_| LiveError::SessionClosed)
    }

    pub async fn seek(&self, time: f64) -> LiveResult<SeekOutcome> {
        self.request(|reply| Command::Seek { time, reply }).await
    }

    /// `None` when no surface is attached or no window exists yet.
    pub async fn playback_resumed(&self) -> LiveResult<Option<SeekOutcome>> {
        self.request(|reply| Command::PlaybackResumed { reply }).await
    }

    pub async fn window(&self) -> LiveResult<Option<SeekWindow>> {
        self.request(|reply| Command::Window { reply }).await
    }

    /// Starts a refresh ahead of the timers. Resolves once the fetch started,
    /// not when it completed.
    pub async fn refresh(&self) -> LiveResult<()> {
        self.request(|reply| Command::Refresh { reply }).await?
    }

    pub fn teardown(&self) {
        _ = self.commands.send(Command::Teardown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
