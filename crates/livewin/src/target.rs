use crate::{manifest::ManifestSnapshot, NETWORK_LATENCY};

/// Derives the time beyond which the manifest must be refreshed.
///
/// Once the seek window reaches the last-but-one known segment of the most
/// advanced stream, a fresh manifest is needed before any stream runs out of
/// references. The network latency allowance moves that point earlier by the
/// expected round trip.
#[derive(Debug, Clone, Copy)]
pub struct TargetTimeEstimator {
    network_latency: f64,
}

impl TargetTimeEstimator {
    pub fn new(network_latency: f64) -> Self {
        Self { network_latency }
    }

    /// Returns `None` when no stream has at least two references yet, or when
    /// the result would be negative.
    pub fn estimate(&self, snapshot: &ManifestSnapshot) -> Option<f64> {
        let max_start = snapshot
            .segment_indexes()
            .filter(|index| index.reference_count() >= 2)
            .filter_map(|index| index.reference_at(index.reference_count() - 2))
            .map(|reference| reference.start_time)
            .max_by(f64::total_cmp)?;

        let target = max_start - self.network_latency;
        (target >= 0.).then_some(target)
    }
}

impl Default for TargetTimeEstimator {
    fn default() -> Self {
        Self::new(NETWORK_LATENCY)
    }
}
