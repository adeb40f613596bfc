// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::alloc::AlignedBox;
use crate::index;
use crate::{calculate_bucket_config, BucketConfig, CreationError};

use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Sentinel `min_value` for an empty histogram.
const MIN_SENTINEL: u64 = u64::MAX;
/// Sentinel `max_value` for an empty histogram.
const MAX_SENTINEL: u64 = 0;

/// A fixed-memory histogram that records integer samples across a wide
/// dynamic range while guaranteeing a fixed number of significant decimal
/// figures for every recorded value.
///
/// `Histogram` may be recorded into concurrently from any number of threads:
/// every mutation (`record_*`) goes through an atomic read-modify-write.
/// Queries (`mean`, `value_at_percentile`, iteration, ...) take a snapshot of
/// `total_count` on entry and are therefore only weakly consistent with
/// respect to concurrent recording -- see the module-level docs in `lib.rs`.
///
/// `reset` and `add` are *not* safe to call concurrently with recorders;
/// callers must externally synchronize those operations.
pub struct Histogram {
    pub(crate) config: BucketConfig,
    pub(crate) normalizing_index_offset: i32,
    pub(crate) conversion_ratio: f64,

    pub(crate) counts: AlignedBox<[AtomicI64]>,

    // Cache-line padding separates these hot, frequently-written scalars from
    // the cold geometry fields above and from each other.
    total_count: CachePadded<AtomicU64>,
    min_value: CachePadded<AtomicU64>,
    max_value: CachePadded<AtomicU64>,
}

#[repr(align(128))]
struct CachePadded<T>(T);

impl<T> core::ops::Deref for CachePadded<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl Histogram {
    /// Constructs a histogram covering `[lowest_trackable_value,
    /// highest_trackable_value]` with `significant_figures` decimal digits of
    /// precision (1-5 inclusive).
    pub fn new(
        lowest_trackable_value: u64,
        highest_trackable_value: u64,
        significant_figures: u8,
    ) -> Result<Self, CreationError> {
        let config = calculate_bucket_config(
            lowest_trackable_value,
            highest_trackable_value,
            significant_figures,
        )?;
        Ok(Self::from_config(config))
    }

    /// Deprecated convenience equivalent to `Histogram::new(1, highest, sig_figs)`.
    #[deprecated(note = "use Histogram::new(1, highest_trackable_value, significant_figures) instead")]
    pub fn alloc(highest_trackable_value: u64, significant_figures: u8) -> Result<Self, CreationError> {
        Self::new(1, highest_trackable_value, significant_figures)
    }

    pub(crate) fn from_config(config: BucketConfig) -> Self {
        let counts = AlignedBox::zeroed_slice(config.counts_len);
        Histogram {
            config,
            normalizing_index_offset: 0,
            conversion_ratio: 1.0,
            counts,
            total_count: CachePadded(AtomicU64::new(0)),
            min_value: CachePadded(AtomicU64::new(MIN_SENTINEL)),
            max_value: CachePadded(AtomicU64::new(MAX_SENTINEL)),
        }
    }

    /// The geometry this histogram was constructed with.
    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Total bytes retained by this histogram's counts array, for capacity
    /// planning purposes.
    pub fn memory_size(&self) -> usize {
        core::mem::size_of::<Self>() + self.config.counts_len * core::mem::size_of::<i64>()
    }

    /// Zeroes every counter and resets the running aggregates. Geometry is
    /// preserved. Not safe to call concurrently with recorders.
    pub fn reset(&self) {
        for cell in self.counts.iter() {
            cell.store(0, Ordering::Relaxed);
        }
        self.total_count.store(0, Ordering::Relaxed);
        self.min_value.store(MIN_SENTINEL, Ordering::Relaxed);
        self.max_value.store(MAX_SENTINEL, Ordering::Relaxed);
    }

    fn counts_index_for(&self, value: u64) -> usize {
        let raw = index::counts_index_for(&self.config, value);
        index::normalize_index(&self.config, raw, self.normalizing_index_offset)
    }

    // ---- recording (C4) ----

    /// Records one occurrence of `value`. Returns `false` (and leaves all
    /// state unchanged) if `value` exceeds `highest_trackable_value`.
    pub fn record_value(&self, value: u64) -> bool {
        self.record_values(value, 1)
    }

    /// Records `count` occurrences of `value`.
    pub fn record_values(&self, value: u64, count: u64) -> bool {
        if value > self.config.highest_trackable_value {
            return false;
        }
        let index = self.counts_index_for(value);
        if index >= self.config.counts_len {
            return false;
        }

        self.counts[index].fetch_add(count as i64, Ordering::Relaxed);
        self.total_count.fetch_add(count, Ordering::Relaxed);
        self.update_min(value);
        self.update_max(value);
        true
    }

    /// Records `value`, backfilling synthetic samples to correct for
    /// coordinated omission: a stalled recorder that would otherwise have
    /// produced samples spaced roughly `expected_interval` apart during the
    /// stall.
    pub fn record_corrected_value(&self, value: u64, expected_interval: u64) -> bool {
        self.record_corrected_values(value, 1, expected_interval)
    }

    /// As [`record_corrected_value`](Self::record_corrected_value), recording
    /// `count` occurrences of `value` and of each backfilled sample.
    pub fn record_corrected_values(&self, value: u64, count: u64, expected_interval: u64) -> bool {
        if !self.record_values(value, count) {
            return false;
        }
        if expected_interval > 0 && value > expected_interval {
            let mut missing_value = value - expected_interval;
            while missing_value >= expected_interval {
                self.record_values(missing_value, count);
                missing_value -= expected_interval;
            }
        }
        true
    }

    fn update_min(&self, value: u64) {
        if value == 0 {
            return;
        }
        let mut current = self.min_value.load(Ordering::Acquire);
        while value < current {
            match self.min_value.compare_exchange_weak(
                current,
                value,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn update_max(&self, value: u64) {
        let mut current = self.max_value.load(Ordering::Acquire);
        while value > current {
            match self.max_value.compare_exchange_weak(
                current,
                value,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    // ---- query engine (C5) ----

    /// Total number of samples ever recorded.
    pub fn total_count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    /// Smallest value recorded, or `0` if nothing has been recorded.
    pub fn min(&self) -> u64 {
        let m = self.min_value.load(Ordering::Acquire);
        if m == MIN_SENTINEL {
            0
        } else {
            m
        }
    }

    /// Largest value recorded, or `0` if nothing has been recorded.
    pub fn max(&self) -> u64 {
        self.max_value.load(Ordering::Acquire)
    }

    /// Count of samples stored in the cell that `value` maps to.
    pub fn count_at_value(&self, value: u64) -> u64 {
        self.count_at_index(self.counts_index_for(value))
    }

    /// Count of samples stored at a raw counts-array index.
    pub fn count_at_index(&self, index: usize) -> u64 {
        self.counts
            .get(index)
            .map(|c| c.load(Ordering::Relaxed).max(0) as u64)
            .unwrap_or(0)
    }

    /// Recovers the nominal value represented by a raw counts-array index.
    pub fn value_at_index(&self, index: usize) -> u64 {
        index::value_at_index(&self.config, index)
    }

    /// The value at or below which `percentile` percent of recorded samples
    /// fall. `percentile` is clamped to `[0, 100]`.
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        let total = self.total_count();
        if total == 0 {
            return 0;
        }
        let percentile = percentile.clamp(0.0, 100.0);
        let mut count_at_percentile = ((percentile / 100.0) * total as f64).ceil() as u64;
        count_at_percentile = count_at_percentile.max(1);

        let mut running = 0u64;
        for i in 0..self.config.counts_len {
            running += self.count_at_index(i);
            if running >= count_at_percentile {
                return self.highest_equivalent_value(self.value_at_index(i));
            }
        }
        self.max()
    }

    /// Arithmetic mean of all recorded values, `0.0` if empty.
    pub fn mean(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        let mut sum = 0.0_f64;
        for i in 0..self.config.counts_len {
            let count = self.count_at_index(i);
            if count == 0 {
                continue;
            }
            let median = index::median_equivalent_value(&self.config, self.value_at_index(i));
            sum += count as f64 * median as f64;
        }
        sum / total as f64
    }

    /// Population standard deviation of all recorded values, `0.0` if empty.
    pub fn stddev(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let mut sum_sq = 0.0_f64;
        for i in 0..self.config.counts_len {
            let count = self.count_at_index(i);
            if count == 0 {
                continue;
            }
            let median = index::median_equivalent_value(&self.config, self.value_at_index(i));
            let delta = median as f64 - mean;
            sum_sq += count as f64 * delta * delta;
        }
        (sum_sq / total as f64).sqrt()
    }

    // ---- equivalence (C2 wrappers) ----

    pub fn lowest_equivalent_value(&self, value: u64) -> u64 {
        index::lowest_equivalent_value(&self.config, value)
    }

    pub fn highest_equivalent_value(&self, value: u64) -> u64 {
        index::highest_equivalent_value(&self.config, value)
    }

    pub fn median_equivalent_value(&self, value: u64) -> u64 {
        index::median_equivalent_value(&self.config, value)
    }

    pub fn next_non_equivalent_value(&self, value: u64) -> u64 {
        index::next_non_equivalent_value(&self.config, value)
    }

    pub fn size_of_equivalent_value_range(&self, value: u64) -> u64 {
        index::size_of_equivalent_range(&self.config, value)
    }

    pub fn values_are_equivalent(&self, a: u64, b: u64) -> bool {
        index::values_are_equivalent(&self.config, a, b)
    }
}
