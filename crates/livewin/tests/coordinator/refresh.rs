use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use livewin::{LiveError, ManifestSnapshot, SeekWindow, SegmentIndex};

use super::{coordinator, live_snapshot, manifest_url, sleep_secs, Script, WindowLog};
use crate::{init_test_tracing, AssertWrapper};

#[tokio::test(start_paused = true)]
async fn test_initial_window_and_advance() -> anyhow::Result<()> {
    init_test_tracing();
    let script = Script::new([Ok(live_snapshot(10., 40., 40., 30.))]);
    let mut coordinator = coordinator(&script);
    let windows = WindowLog::default();
    windows.observe(&mut coordinator);

    coordinator.load_initial(manifest_url()).await?;
    assert_eq!(coordinator.window(), Some(SeekWindow { start: 10., end: 50. }));
    assert_eq!(coordinator.target_update_time(), Some(28.));
    assert!(coordinator.scheduler().is_refresh_armed());
    assert!(coordinator.scheduler().is_advance_armed());
    assert_eq!(windows.len(), 1);

    let (handle, _task) = coordinator.spawn();
    sleep_secs(5.5).await;

    let window = handle.window().await?.assert_success();
    assert_eq!(window, SeekWindow { start: 15., end: 55. });
    assert_eq!(windows.last(), Some(window));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_window_grows_until_depth() -> anyhow::Result<()> {
    // 20 seconds of segments, 30 seconds of time shift buffer
    let script = Script::new([Ok(live_snapshot(10., 20., 30., 30.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;
    assert_eq!(coordinator.window(), Some(SeekWindow { start: 10., end: 30. }));

    let (handle, _task) = coordinator.spawn();
    sleep_secs(10.5).await;
    assert_eq!(
        handle.window().await?,
        Some(SeekWindow { start: 10., end: 40. })
    );

    sleep_secs(5.).await;
    assert_eq!(
        handle.window().await?,
        Some(SeekWindow { start: 15., end: 45. })
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_refresh_delay_has_floor() -> anyhow::Result<()> {
    // A single reference per stream leaves the target undefined, so only the
    // refresh timer fetches.
    let script = Script::new([Ok(live_snapshot(40., 40., 40., 1.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;
    assert_eq!(coordinator.target_update_time(), None);
    assert_eq!(
        coordinator.scheduler().refresh_delay(),
        Duration::from_secs(3)
    );

    let (_handle, _task) = coordinator.spawn();
    sleep_secs(2.5).await;
    assert_eq!(script.fetches(), 1);

    sleep_secs(1.).await;
    assert_eq!(script.fetches(), 2);

    sleep_secs(3.).await;
    assert_eq!(script.fetches(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_refresh_delay_follows_min_update_period() -> anyhow::Result<()> {
    let script = Script::new([Ok(live_snapshot(40., 40., 40., 8.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;

    let (_handle, _task) = coordinator.spawn();
    sleep_secs(7.5).await;
    assert_eq!(script.fetches(), 1);

    sleep_secs(1.).await;
    assert_eq!(script.fetches(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_early_refresh_is_rate_limited() -> anyhow::Result<()> {
    // The window end is already past the target, so every advance asks for
    // a refresh. Only one per minimum interval goes through.
    let script = Script::new([Ok(live_snapshot(10., 40., 40., 30.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;

    let (_handle, _task) = coordinator.spawn();
    sleep_secs(2.5).await;
    assert_eq!(script.fetches(), 1);

    sleep_secs(8.).await;
    // t=0, 3, 6 and 9
    assert_eq!(script.fetches(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_early_refresh_waits_for_target() -> anyhow::Result<()> {
    let script = Script::new([
        Ok(live_snapshot(10., 40., 40., 30.)),
        // target moves to 80 - 2
        Ok(live_snapshot(10., 90., 40., 30.)),
    ]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;

    let (_handle, _task) = coordinator.spawn();
    sleep_secs(3.5).await;
    assert_eq!(script.fetches(), 2);

    // The window end reaches 78 at t=28
    sleep_secs(24.).await;
    assert_eq!(script.fetches(), 2);

    sleep_secs(1.).await;
    assert_eq!(script.fetches(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_snapshot() -> anyhow::Result<()> {
    let script = Script::new([
        Ok(live_snapshot(40., 40., 40., 5.)),
        Err(LiveError::MpdParsing("truncated".to_string())),
    ]);
    let mut coordinator = coordinator(&script);
    let updates = Arc::new(AtomicUsize::new(0));
    {
        let updates = updates.clone();
        coordinator.on_manifest_updated(move |_| {
            updates.fetch_add(1, Ordering::SeqCst);
        });
    }
    coordinator.load_initial(manifest_url()).await?;
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    let (handle, _task) = coordinator.spawn();
    sleep_secs(7.).await;
    assert_eq!(script.fetches(), 2);
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    assert!(handle.window().await?.is_some());

    // The refresh timer is re-armed with the previous delay
    sleep_secs(3.5).await;
    assert_eq!(script.fetches(), 3);
    assert_eq!(updates.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_presentation_ending_stops_timers() -> anyhow::Result<()> {
    let ended = ManifestSnapshot {
        live: false,
        ..live_snapshot(10., 40., 0., 0.)
    };
    let script = Script::new([Ok(live_snapshot(10., 40., 40., 30.)), Ok(ended)]);
    let mut coordinator = coordinator(&script);
    let windows = WindowLog::default();
    windows.observe(&mut coordinator);
    coordinator.load_initial(manifest_url()).await?;

    let (handle, _task) = coordinator.spawn();
    sleep_secs(3.5).await;
    assert_eq!(script.fetches(), 2);
    let window = handle.window().await?.assert_success();
    assert_eq!(window, SeekWindow { start: 13., end: 53. });

    let reported = windows.len();
    sleep_secs(20.).await;
    assert_eq!(script.fetches(), 2);
    assert_eq!(handle.window().await?, Some(window));
    assert_eq!(windows.len(), reported);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_single_refresh_in_flight() -> anyhow::Result<()> {
    let script = Script::new([Ok(live_snapshot(40., 40., 40., 30.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;

    let (handle, _task) = coordinator.spawn();
    script.set_fetch_delay(Duration::from_secs(10));
    handle.refresh().await.assert_success();
    assert!(matches!(
        handle.refresh().await,
        Err(LiveError::RefreshInFlight)
    ));

    sleep_secs(1.).await;
    assert_eq!(script.fetches(), 2);

    sleep_secs(10.).await;
    assert_eq!(script.fetches(), 2);
    handle.refresh().await.assert_success();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_teardown() -> anyhow::Result<()> {
    let script = Script::new([Ok(live_snapshot(10., 40., 40., 30.))]);
    let mut coordinator = coordinator(&script);
    coordinator.load_initial(manifest_url()).await?;

    let (handle, task) = coordinator.spawn();
    sleep_secs(1.5).await;
    handle.teardown();
    task.await?;

    assert!(handle.is_closed());
    assert!(matches!(handle.seek(20.).await, Err(LiveError::SessionClosed)));

    sleep_secs(10.).await;
    assert_eq!(script.fetches(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_teardown_drops_in_flight_refresh() -> anyhow::Result<()> {
    let script = Script::new([Ok(live_snapshot(40., 40., 40., 30.))]);
    let mut coordinator = coordinator(&script);
    let updates = Arc::new(AtomicUsize::new(0));
    {
        let updates = updates.clone();
        coordinator.on_manifest_updated(move |_| {
            updates.fetch_add(1, Ordering::SeqCst);
        });
    }
    coordinator.load_initial(manifest_url()).await?;

    let (handle, task) = coordinator.spawn();
    script.set_fetch_delay(Duration::from_secs(5));
    handle.refresh().await?;
    sleep_secs(1.).await;
    handle.teardown();
    task.await?;

    sleep_secs(10.).await;
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now() -> anyhow::Result<()> {
    let script = Script::new([
        Ok(live_snapshot(10., 40., 40., 30.)),
        Ok(live_snapshot(10., 50., 40., 30.)),
    ]);
    let mut coordinator = coordinator(&script);
    assert!(matches!(
        coordinator.refresh_now().await,
        Err(LiveError::NotLoaded)
    ));

    coordinator.load_initial(manifest_url()).await?;
    assert_eq!(coordinator.target_update_time(), Some(28.));

    coordinator.refresh_now().await?;
    assert_eq!(coordinator.target_update_time(), Some(38.));
    // The window only moves with time
    assert_eq!(coordinator.window(), Some(SeekWindow { start: 10., end: 50. }));

    coordinator.teardown();
    assert!(!coordinator.scheduler().is_refresh_armed());
    assert!(matches!(
        coordinator.refresh_now().await,
        Err(LiveError::SessionClosed)
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_load_without_segments() {
    let script = Script::new([Ok(ManifestSnapshot {
        live: true,
        ..live_snapshot(10., 0., 40., 2.)
    })]);
    let mut coordinator = coordinator(&script);
    assert!(matches!(
        coordinator.load_initial(manifest_url()).await,
        Err(LiveError::NoSegmentsAvailable)
    ));
    assert!(!coordinator.is_alive());
    assert_eq!(coordinator.window(), None);
}

#[tokio::test(start_paused = true)]
async fn test_static_presentation() -> anyhow::Result<()> {
    let mut snapshot = live_snapshot(0., 50., 0., 0.);
    snapshot.live = false;
    snapshot.periods[0].stream_sets[1].streams[0].segment_index =
        Some(SegmentIndex::from_start_times(&[2., 12., 22.], 10.));
    let script = Script::new([Ok(snapshot)]);
    let mut coordinator = coordinator(&script);

    coordinator.load_initial(manifest_url()).await?;
    assert!(!coordinator.is_live());
    assert_eq!(coordinator.window(), Some(SeekWindow { start: 2., end: 32. }));
    assert!(!coordinator.scheduler().is_refresh_armed());
    assert!(!coordinator.scheduler().is_advance_armed());
    Ok(())
}
