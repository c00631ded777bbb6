use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};
use dash_mpd::UTCTiming;

use crate::{
    error::{LiveError, LiveResult},
    util::http::HttpClient,
};

/// Wall clock of the origin, tracked as an offset from the local clock.
///
/// Availability of `SegmentTemplate@duration` segments is computed against this
/// clock, so a local clock running ahead would otherwise request segments that
/// do not exist yet.
#[derive(Debug)]
pub struct ServerClock {
    /// How much time the local clock is behind the remote clock
    offset: RwLock<TimeDelta>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            offset: RwLock::new(TimeDelta::zero()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    pub fn offset(&self) -> TimeDelta {
        *self.offset.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_time(
        &self,
        remote_now: DateTime<Utc>,
        before_request: DateTime<Utc>,
        after_request: DateTime<Utc>,
    ) {
        // The server read its clock roughly half a round trip before the response arrived
        let half_rtt = (after_request - before_request) / 2;
        let offset = remote_now + half_rtt - after_request;
        *self.offset.write().unwrap_or_else(|e| e.into_inner()) = offset;
        tracing::info!(offset_milliseconds = %offset.num_milliseconds(), "Clock time set to {}, offset calculated", remote_now);
    }

    /// Synchronizes with the first `UTCTiming` element that works.
    ///
    /// Without any `UTCTiming` element the local clock is trusted. On failure
    /// the previous offset is kept and the last error returned.
    pub async fn sync(&self, timing: &[UTCTiming], client: &HttpClient) -> LiveResult<()> {
        if timing.is_empty() {
            tracing::debug!("No UTCTiming elements found in MPD, using local time.");
            return Ok(());
        }

        let mut last_error = None;
        for timing in timing {
            tracing::debug!(
                scheme = ?timing.schemeIdUri,
                value = ?timing.value,
                "Attempting to sync time with scheme"
            );
            match fetch_time(timing, client).await {
                Ok((remote_now, before_request, after_request)) => {
                    self.set_time(remote_now, before_request, after_request);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(scheme = ?timing.schemeIdUri, error = %e, "Failed to sync time");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LiveError::InvalidTimingSchema("All supported time sync methods failed".to_string())
        }))
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_iso8601(text: &str) -> LiveResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // xs:dateTime without an explicit offset
            DateTime::parse_from_str(&format!("{text}+00:00"), "%Y-%m-%dT%H:%M:%S%.f%:z")
                .map(|dt| dt.with_timezone(&Utc))
        })?)
}

/// Returns the remote time along with the local time before and after the request.
async fn fetch_time(
    timing: &UTCTiming,
    client: &HttpClient,
) -> LiveResult<(DateTime<Utc>, DateTime<Utc>, DateTime<Utc>)> {
    let scheme = timing.schemeIdUri.as_deref().ok_or_else(|| {
        LiveError::InvalidTimingSchema("Missing UTCTiming@schemeIdUri".to_string())
    })?;
    let value = timing
        .value
        .as_deref()
        .ok_or_else(|| LiveError::InvalidTimingSchema(format!("Missing value for {scheme}")))?;

    match scheme {
        "urn:mpeg:dash:utc:direct:2014" => {
            let now = Utc::now();
            Ok((parse_iso8601(value.trim())?, now, now))
        }
        "urn:mpeg:dash:utc:http-xsdate:2014" | "urn:mpeg:dash:utc:http-iso:2014" => {
            let before_request = Utc::now();
            let response = client.get(value).send().await?;
            let after_request = Utc::now();
            if !response.status().is_success() {
                return Err(LiveError::HttpError(response.status()));
            }
            let text = response.text().await?;
            Ok((parse_iso8601(text.trim())?, before_request, after_request))
        }
        "urn:mpeg:dash:utc:http-head:2014" => {
            let before_request = Utc::now();
            let response = client.head(value).send().await?;
            let after_request = Utc::now();
            if !response.status().is_success() {
                return Err(LiveError::HttpError(response.status()));
            }
            let date = response
                .headers()
                .get(reqwest::header::DATE)
                .ok_or_else(|| LiveError::DateTimeParsing("Missing Date header".to_string()))?
                .to_str()
                .map_err(|_| LiveError::DateTimeParsing("Invalid Date header string".to_string()))?;
            let remote_now = DateTime::parse_from_rfc2822(date)?.with_timezone(&Utc);
            Ok((remote_now, before_request, after_request))
        }
        "urn:mpeg:dash:utc:http-ntp:2014" | "urn:mpeg:dash:utc:ntp:2014" => Err(
            LiveError::InvalidTimingSchema(format!("Unsupported scheme: {scheme}")),
        ),
        others => Err(LiveError::InvalidTimingSchema(others.into())),
    }
}
