// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A fixed-memory histogram for recording integer samples across a wide
//! dynamic range (1 to ~3.6e12) while guaranteeing a configurable number of
//! significant decimal figures of relative precision, regardless of where in
//! the range a value falls.
//!
//! # Concurrency model
//!
//! [`Histogram`] is built to be recorded into from many threads at once
//! without external locking: `record_value` and friends resolve a counts-cell
//! index and perform a single relaxed `fetch_add`, with `min`/`max` tracked
//! separately via CAS loops. There is no cross-cell atomicity -- a reader
//! racing a batch of concurrent writes may observe a `total_count` that is
//! momentarily ahead of or behind the sum of individual cell counts. Every
//! query in this crate (`mean`, `value_at_percentile`, iteration, ...)
//! snapshots `total_count` once on entry and is documented as only weakly
//! consistent with concurrent recorders. Use `reset` and the merge functions
//! in [`merge`] only when no recorder can observe the histogram concurrently.
//!
//! # Example
//!
//! ```
//! use hdr_histogram_core::Histogram;
//!
//! let histogram = Histogram::new(1, 3_600_000_000, 3).unwrap();
//! histogram.record_value(1_234);
//! histogram.record_value(5_678);
//! assert_eq!(2, histogram.total_count());
//! assert!(histogram.value_at_percentile(50.0) >= 1_234);
//! ```

pub mod alloc;
mod config;
mod error;
mod histogram;
mod index;
pub mod iter;
pub mod merge;

pub use config::{calculate_bucket_config, BucketConfig};
pub use error::CreationError;
pub use histogram::Histogram;
pub use iter::{HistogramIterator, IterationValue};

impl Histogram {
    /// Iterates every counts-array cell from lowest to highest, including
    /// empty ones, stopping once every recorded sample has been accounted
    /// for.
    pub fn iter_raw(&self) -> HistogramIterator<'_> {
        HistogramIterator::raw(self)
    }

    /// As [`iter_raw`](Self::iter_raw), but skips cells with no recorded
    /// samples.
    pub fn iter_recorded(&self) -> HistogramIterator<'_> {
        HistogramIterator::recorded(self)
    }

    /// Iterates in fixed-size linear steps of `value_units_per_bucket`,
    /// aggregating the counts that fall within each step. A step may revisit
    /// the same underlying cell more than once if that cell's equivalence
    /// range is wider than the step.
    pub fn iter_linear(&self, value_units_per_bucket: u64) -> HistogramIterator<'_> {
        HistogramIterator::linear(self, value_units_per_bucket)
    }

    /// Iterates in geometrically growing steps, starting at
    /// `value_units_first_bucket` and multiplying by `log_base` after each
    /// step.
    pub fn iter_log(&self, value_units_first_bucket: f64, log_base: f64) -> HistogramIterator<'_> {
        HistogramIterator::log(self, value_units_first_bucket, log_base)
    }

    /// Iterates over percentile boundaries, refining the step size as the
    /// percentile approaches 100 so that `ticks_per_half_distance` steps are
    /// taken between each percentile and halfway to the next order of
    /// magnitude of precision. Always yields the bucket containing the
    /// maximum recorded value exactly once.
    pub fn iter_percentiles(&self, ticks_per_half_distance: u32) -> HistogramIterator<'_> {
        HistogramIterator::percentiles(self, ticks_per_half_distance)
    }
}
