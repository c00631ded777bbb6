/// Builds [`ManifestSnapshot`]s out of MPDs.
///
/// References:
/// - [DASH-IF implementation guidelines: restricted timing model](https://dashif.org/Guidelines-TimingModel)
/// - [MPEG-DASH](https://www.mpeg.org/standards/MPEG-DASH/)
use chrono::{DateTime, Utc};
use dash_mpd::{AdaptationSet, Period as MpdPeriod, Representation, SegmentTemplate, MPD};
use url::Url;

use super::{clock::ServerClock, template::Template, url::merge_baseurls};
use crate::{
    error::{LiveError, LiveResult},
    manifest::{ManifestSnapshot, Period, SegmentIndex, SegmentReference, Stream, StreamSet},
    source::{ManifestProcessor, RawManifest},
    util::http::HttpClient,
};

/// Upper bound of references kept for one stream. The most recent ones win.
const MAX_GENERATED_REFERENCES: u64 = 4096;

pub struct DashManifestProcessor {
    client: HttpClient,
    clock: ServerClock,
    sync_clock: bool,
}

impl DashManifestProcessor {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            clock: ServerClock::new(),
            sync_clock: true,
        }
    }

    /// Trust the local clock instead of `UTCTiming`.
    pub fn without_clock_sync(mut self) -> Self {
        self.sync_clock = false;
        self
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    /// Parses `raw` as it stands at wall-clock time `now`.
    pub fn parse(&self, raw: &RawManifest, now: DateTime<Utc>) -> LiveResult<ManifestSnapshot> {
        let mpd = dash_mpd::parse(&raw.body)?;
        snapshot_from_mpd(mpd, &raw.url, now)
    }
}

impl ManifestProcessor for DashManifestProcessor {
    async fn process(&self, raw: RawManifest) -> LiveResult<ManifestSnapshot> {
        let mpd = dash_mpd::parse(&raw.body)?;

        if self.sync_clock && is_dynamic(&mpd) {
            if let Err(e) = self.clock.sync(&mpd.UTCTiming, &self.client).await {
                tracing::warn!(error = %e, "Clock sync failed, keeping the previous offset");
            }
        }

        snapshot_from_mpd(mpd, &raw.url, self.clock.now())
    }
}

fn is_dynamic(mpd: &MPD) -> bool {
    mpd.mpdtype.as_deref() == Some("dynamic")
}

/// Timing shared by every representation of a presentation.
struct Presentation {
    live: bool,
    time_shift_buffer_depth: f64,
    /// Seconds elapsed on the presentation timeline, for dynamic MPDs that
    /// declare `MPD@availabilityStartTime`.
    live_edge: Option<f64>,
}

fn snapshot_from_mpd(
    mpd: MPD,
    manifest_url: &Url,
    now: DateTime<Utc>,
) -> LiveResult<ManifestSnapshot> {
    let live = is_dynamic(&mpd);
    let time_shift_buffer_depth = mpd
        .timeShiftBufferDepth
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.);
    let min_update_period = mpd
        .minimumUpdatePeriod
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.);

    let presentation = Presentation {
        live,
        time_shift_buffer_depth,
        live_edge: mpd
            .availabilityStartTime
            .filter(|_| live)
            .map(|zero_point| (now - zero_point).num_milliseconds() as f64 / 1000.),
    };

    let base_url = match mpd.base_url.first() {
        Some(base) => merge_baseurls(manifest_url, &base.base)?,
        None => manifest_url.clone(),
    };

    let presentation_duration = mpd.mediaPresentationDuration.map(|d| d.as_secs_f64());
    let mut timing: Vec<(f64, Option<f64>)> = Vec::with_capacity(mpd.periods.len());
    for period in &mpd.periods {
        // Period@start, or the end of the previous period
        let start = match (period.start, timing.last_mut()) {
            (Some(start), previous) => {
                let start = start.as_secs_f64();
                if let Some((previous_start, previous_duration @ None)) = previous {
                    *previous_duration = Some(start - *previous_start);
                }
                start
            }
            (None, None) => 0.,
            (None, Some((previous_start, Some(previous_duration)))) => {
                *previous_start + *previous_duration
            }
            (None, Some((_, None))) => {
                return Err(LiveError::MpdParsing("Missing period duration".to_string()))
            }
        };
        timing.push((start, period.duration.map(|d| d.as_secs_f64())));
    }

    // The last period of a static presentation ends with the presentation
    if let (false, Some(presentation_duration), Some((start, duration @ None))) =
        (live, presentation_duration, timing.last_mut())
    {
        *duration = Some(presentation_duration - *start);
    }

    let periods = mpd
        .periods
        .iter()
        .zip(timing)
        .map(|(period, (start, duration))| {
            build_period(&presentation, &base_url, period, start, duration)
        })
        .collect::<LiveResult<Vec<_>>>()?;

    Ok(ManifestSnapshot {
        live,
        time_shift_buffer_depth,
        min_update_period,
        periods,
    })
}

fn build_period(
    presentation: &Presentation,
    base_url: &Url,
    period: &MpdPeriod,
    start: f64,
    duration: Option<f64>,
) -> LiveResult<Period> {
    let base_url = match period.BaseURL.first() {
        Some(base) => merge_baseurls(base_url, &base.base)?,
        None => base_url.clone(),
    };

    let mut stream_sets = Vec::with_capacity(period.adaptations.len());
    for adaptation_set in &period.adaptations {
        let base_url = match adaptation_set.BaseURL.first() {
            Some(base) => merge_baseurls(&base_url, &base.base)?,
            None => base_url.clone(),
        };

        let mut streams = Vec::with_capacity(adaptation_set.representations.len());
        for representation in &adaptation_set.representations {
            let base_url = match representation.BaseURL.first() {
                Some(base) => merge_baseurls(&base_url, &base.base)?,
                None => base_url.clone(),
            };

            let segment_template = representation
                .SegmentTemplate
                .as_ref()
                .or(adaptation_set.SegmentTemplate.as_ref())
                .or(period.SegmentTemplate.as_ref());
            let segment_index = match segment_template {
                Some(segment_template) => Some(build_segment_index(
                    presentation,
                    &base_url,
                    representation,
                    segment_template,
                    start,
                    duration,
                )?),
                None => None,
            };

            streams.push(Stream {
                id: representation.id.clone(),
                bandwidth: representation.bandwidth,
                segment_index,
            });
        }

        stream_sets.push(StreamSet {
            content_type: content_type(adaptation_set),
            streams,
        });
    }

    Ok(Period {
        id: period.id.clone(),
        start,
        stream_sets,
    })
}

fn content_type(adaptation_set: &AdaptationSet) -> Option<String> {
    adaptation_set.contentType.clone().or_else(|| {
        adaptation_set
            .mimeType
            .as_deref()
            .and_then(|mime| mime.split_once('/'))
            .map(|(top_level, _)| top_level.to_string())
    })
}

fn build_segment_index(
    presentation: &Presentation,
    base_url: &Url,
    representation: &Representation,
    segment_template: &SegmentTemplate,
    period_start: f64,
    period_duration: Option<f64>,
) -> LiveResult<SegmentIndex> {
    let timescale = segment_template.timescale.unwrap_or(1).max(1) as f64;
    let presentation_time_offset = segment_template.presentationTimeOffset.unwrap_or(0) as f64;
    let start_number = segment_template.startNumber.unwrap_or(1);

    let mut template = Template::new();
    template
        .insert_optional(Template::REPRESENTATION_ID, representation.id.clone())
        .insert(
            Template::BANDWIDTH,
            representation.bandwidth.unwrap_or(0).to_string(),
        );

    let mut resolve = |number: u64, time: u64| -> LiveResult<Option<String>> {
        let Some(media) = segment_template.media.as_deref() else {
            return Ok(None);
        };
        template
            .insert(Template::NUMBER, number.to_string())
            .insert(Template::TIME, time.to_string());
        Ok(Some(merge_baseurls(base_url, &template.resolve(media))?.to_string()))
    };
    let to_seconds = |time: f64| period_start + (time - presentation_time_offset) / timescale;

    let mut references = Vec::new();
    if let Some(timeline) = &segment_template.SegmentTimeline {
        // Presentation time, in timescale units, where open-ended repeats stop
        let period_end = period_duration
            .or_else(|| presentation.live_edge.map(|edge| edge - period_start))
            .map(|end| end * timescale + presentation_time_offset);

        let mut time = timeline.segments.first().and_then(|s| s.t).unwrap_or(0);
        let mut number = start_number;
        for (i, s) in timeline.segments.iter().enumerate() {
            if let Some(t) = s.t {
                time = t;
            }
            if s.d == 0 {
                return Err(LiveError::MpdParsing("Zero S@d in SegmentTimeline".to_string()));
            }

            let repeat_count = match s.r {
                Some(r) if r >= 0 => {
                    let r = r as u64;
                    if r >= MAX_GENERATED_REFERENCES {
                        tracing::warn!(
                            repeat = r,
                            "S@r too large, keeping the most recent segments"
                        );
                        // Skip the oldest repeats so the kept ones stay on the timeline
                        let skipped = r - (MAX_GENERATED_REFERENCES - 1);
                        time = skipped
                            .checked_mul(s.d)
                            .and_then(|offset| time.checked_add(offset))
                            .ok_or_else(|| {
                                LiveError::MpdParsing("SegmentTimeline time overflow".to_string())
                            })?;
                        number = number.checked_add(skipped).ok_or_else(|| {
                            LiveError::MpdParsing("SegmentTimeline number overflow".to_string())
                        })?;
                    }
                    r.min(MAX_GENERATED_REFERENCES - 1)
                }
                Some(_) => {
                    // Repeat until the next S@t, or the end of the period
                    let limit = timeline
                        .segments
                        .get(i + 1)
                        .and_then(|next| next.t)
                        .map(|t| t as f64)
                        .or(period_end);
                    match limit {
                        Some(limit) if limit > time as f64 => {
                            let count = ((limit - time as f64) / s.d as f64).ceil() as u64;
                            count.clamp(1, MAX_GENERATED_REFERENCES) - 1
                        }
                        _ => 0,
                    }
                }
                None => 0,
            };

            // S@r counts additional references, so S@r=5 means 6 segments
            for _ in 0..=repeat_count {
                let end_time = time.checked_add(s.d).ok_or_else(|| {
                    LiveError::MpdParsing("SegmentTimeline time overflow".to_string())
                })?;
                let mut reference =
                    SegmentReference::new(to_seconds(time as f64), to_seconds(end_time as f64));
                if let Some(url) = resolve(number, time)? {
                    reference = reference.with_url(url);
                }
                references.push(reference);
                if references.len() > 2 * MAX_GENERATED_REFERENCES as usize {
                    references.drain(..MAX_GENERATED_REFERENCES as usize);
                }

                time = end_time;
                number = number.checked_add(1).ok_or_else(|| {
                    LiveError::MpdParsing("SegmentTimeline number overflow".to_string())
                })?;
            }
        }
    } else if let Some(duration) = segment_template.duration.filter(|d| *d > 0.) {
        let segment_duration = duration / timescale;
        let Some((first, count)) =
            numbered_segment_range(presentation, segment_duration, period_start, period_duration)
        else {
            return Ok(SegmentIndex::default());
        };

        for k in first..count {
            let start = period_start + k as f64 * segment_duration;
            let mut reference = SegmentReference::new(start, start + segment_duration);
            let time = (k as f64 * duration + presentation_time_offset) as u64;
            if let Some(url) = resolve(start_number + k, time)? {
                reference = reference.with_url(url);
            }
            references.push(reference);
        }
    }

    if references.len() > MAX_GENERATED_REFERENCES as usize {
        let excess = references.len() - MAX_GENERATED_REFERENCES as usize;
        references.drain(..excess);
    }
    Ok(SegmentIndex::new(references))
}

/// `[first, count)` segment positions of a `SegmentTemplate@duration` stream,
/// counted from the period start.
fn numbered_segment_range(
    presentation: &Presentation,
    segment_duration: f64,
    period_start: f64,
    period_duration: Option<f64>,
) -> Option<(u64, u64)> {
    let total = period_duration.map(|d| (d / segment_duration).ceil() as u64);

    if !presentation.live {
        let count = total?;
        return Some((count.saturating_sub(MAX_GENERATED_REFERENCES), count));
    }

    let Some(live_edge) = presentation.live_edge else {
        tracing::warn!("Dynamic MPD with SegmentTemplate@duration but no availabilityStartTime");
        return None;
    };

    // A segment is available once it is complete
    let elapsed = live_edge - period_start;
    if elapsed < segment_duration {
        return Some((0, 0));
    }
    let mut count = (elapsed / segment_duration).floor() as u64;
    if let Some(total) = total {
        count = count.min(total);
    }

    let first = if presentation.time_shift_buffer_depth > 0. {
        ((elapsed - presentation.time_shift_buffer_depth) / segment_duration)
            .floor()
            .max(0.) as u64
    } else {
        0
    };
    let first = first.max(count.saturating_sub(MAX_GENERATED_REFERENCES));

    Some((first.min(count), count))
}
