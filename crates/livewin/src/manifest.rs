/// A parsed manifest: periods, stream sets (adaptation sets) and streams
/// (representations).
///
/// Snapshots are immutable once built. A refresh produces a new snapshot that
/// replaces the previous one as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestSnapshot {
    /// `MPD@type="dynamic"`
    pub live: bool,
    /// Maximum width of the live seek window, in seconds. Zero when the manifest omits it.
    pub time_shift_buffer_depth: f64,
    /// Manifest-declared minimum refresh period, in seconds. Zero when the manifest omits it.
    pub min_update_period: f64,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Period {
    pub id: Option<String>,
    /// Start on the presentation timeline, in seconds.
    pub start: f64,
    pub stream_sets: Vec<StreamSet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSet {
    pub content_type: Option<String>,
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    pub id: Option<String>,
    pub bandwidth: Option<u64>,
    pub segment_index: Option<SegmentIndex>,
}

/// Ordered segment references of one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentIndex {
    references: Vec<SegmentReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReference {
    /// Presentation time, in seconds.
    pub start_time: f64,
    pub end_time: f64,
    pub url: Option<String>,
}

impl SegmentReference {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
            url: None,
        }
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }
}

impl SegmentIndex {
    /// References are sorted by start time.
    pub fn new(mut references: Vec<SegmentReference>) -> Self {
        references.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Self { references }
    }

    /// Builds an index from start times only; each reference ends where the next starts.
    pub fn from_start_times(start_times: &[f64], last_duration: f64) -> Self {
        let references = start_times
            .iter()
            .enumerate()
            .map(|(i, start)| {
                let end = start_times
                    .get(i + 1)
                    .copied()
                    .unwrap_or(start + last_duration);
                SegmentReference::new(*start, end)
            })
            .collect();
        Self::new(references)
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn reference_at(&self, index: usize) -> Option<&SegmentReference> {
        self.references.get(index)
    }

    pub fn first(&self) -> Option<&SegmentReference> {
        self.references.first()
    }

    pub fn last(&self) -> Option<&SegmentReference> {
        self.references.last()
    }

    pub fn references(&self) -> &[SegmentReference] {
        &self.references
    }
}

impl ManifestSnapshot {
    /// Every stream of every stream set of every period.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.periods
            .iter()
            .flat_map(|p| p.stream_sets.iter())
            .flat_map(|s| s.streams.iter())
    }

    pub fn segment_indexes(&self) -> impl Iterator<Item = &SegmentIndex> {
        self.streams().filter_map(|s| s.segment_index.as_ref())
    }

    /// Time range covered by every stream at once.
    ///
    /// The start is the latest first segment start, the end is the earliest last
    /// segment end. Streams without references are ignored. Returns `None` if
    /// no stream has any reference.
    pub fn stream_limits(&self) -> Option<(f64, f64)> {
        let mut limits: Option<(f64, f64)> = None;
        for index in self.segment_indexes() {
            let (Some(first), Some(last)) = (index.first(), index.last()) else {
                continue;
            };

            limits = Some(match limits {
                Some((start, end)) => (start.max(first.start_time), end.min(last.end_time)),
                None => (first.start_time, last.end_time),
            });
        }

        // Streams that do not overlap at all still give a usable window at their shared end
        limits.map(|(start, end)| (start.min(end), end))
    }
}
