//! Software-time to sample-number correlation.
//!
//! The acquisition device reports one anchor per processing block: the
//! software timestamp at which the block's first sample number was observed.
//! A camera frame only carries its software arrival time, so to place it on
//! the device's sample clock we interpolate linearly between the two anchors
//! that bracket the arrival time.
//!
//! Interpolation assumes the sample clock advances uniformly between two
//! block boundaries. Block durations are short relative to clock drift, so
//! the approximation holds in practice; it is intentionally not corrected.
//!
//! No extrapolation: a time before the first anchor or after the last one is
//! reported as unresolvable, and the caller retries once more anchors arrive.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::{Mutex, PoisonError};

/// Bounded history of `(software_time -> sample_number)` anchors.
///
/// Anchors arriving out of order are tolerated: the map is keyed by software
/// time, and a duplicate time overwrites the earlier entry.
#[derive(Debug, Default)]
pub struct TimeCorrelator {
    anchors: Mutex<BTreeMap<i64, i64>>,
}

impl TimeCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one acquisition block's anchor pair.
    pub fn add_anchor(&self, software_time: i64, sample_number: i64) {
        let mut anchors = self.anchors.lock().unwrap_or_else(PoisonError::into_inner);
        anchors.insert(software_time, sample_number);
    }

    /// Map a software arrival time onto the sample clock.
    ///
    /// Returns `None` while the time is not yet bracketed by two anchors.
    pub fn resolve(&self, arrival_time: i64) -> Option<i64> {
        let anchors = self.anchors.lock().unwrap_or_else(PoisonError::into_inner);

        // A time landing exactly on an anchor resolves to it directly.
        if let Some(&sample) = anchors.get(&arrival_time) {
            return Some(sample);
        }

        let (&lower_time, &lower_sample) = anchors.range(..arrival_time).next_back()?;
        let (&upper_time, &upper_sample) =
            anchors.range((Excluded(arrival_time), Unbounded)).next()?;

        if upper_time == lower_time {
            // Degenerate bracket; keyed map makes this unreachable, kept as a
            // division-by-zero guard.
            return Some(lower_sample);
        }

        let factor = (arrival_time - lower_time) as f64 / (upper_time - lower_time) as f64;
        Some(lower_sample + (factor * (upper_sample - lower_sample) as f64) as i64)
    }

    /// Drop anchors no longer needed to resolve times at or after `oldest_pending`.
    ///
    /// The greatest anchor at or before `oldest_pending` is the lower bracket
    /// for every remaining frame, so it survives the prune.
    pub fn prune_older_than(&self, oldest_pending: i64) {
        let mut anchors = self.anchors.lock().unwrap_or_else(PoisonError::into_inner);
        let keep_from = anchors
            .range((Unbounded, Included(oldest_pending)))
            .next_back()
            .map(|(&time, _)| time);
        if let Some(keep_from) = keep_from {
            let kept = anchors.split_off(&keep_from);
            *anchors = kept;
        }
    }

    pub fn clear(&self) {
        self.anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
