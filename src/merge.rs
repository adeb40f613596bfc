// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Merging samples recorded in one histogram into another.
//!
//! Generalizes the `AddAssign`-style whole-histogram combination to the HDR
//! cell layout and extends it with coordinated-omission correction during
//! merge, alongside plain `add`.

use crate::Histogram;
use core::sync::atomic::Ordering;

/// Adds every recorded sample in `src` into `dst`.
///
/// Returns the number of samples from `src` that fell outside `dst`'s
/// trackable range and were dropped rather than erroring: `dst`'s geometry is
/// fixed at construction, so a source with a wider range can't be resized to
/// fit.
///
/// Not safe to call concurrently with recorders on either histogram.
pub fn add(dst: &Histogram, src: &Histogram) -> u64 {
    let mut dropped = 0u64;
    for index in 0..src.config().counts_len() {
        let count = src.counts[index].load(Ordering::Relaxed);
        if count == 0 {
            continue;
        }
        let value = src.value_at_index(index);
        if !dst.record_values(value, count as u64) {
            dropped += count as u64;
        }
    }
    dropped
}

/// As [`add`], but backfills synthetic samples for each value recorded in
/// `src` to correct for coordinated omission, as
/// [`Histogram::record_corrected_value`] does for a single sample.
pub fn add_while_correcting_for_coordinated_omission(
    dst: &Histogram,
    src: &Histogram,
    expected_interval: u64,
) -> u64 {
    let mut dropped = 0u64;
    for index in 0..src.config().counts_len() {
        let count = src.counts[index].load(Ordering::Relaxed);
        if count == 0 {
            continue;
        }
        let value = src.value_at_index(index);
        if !dst.record_corrected_values(value, count as u64, expected_interval) {
            dropped += count as u64;
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_combines_counts_from_both_histograms() {
        let a = Histogram::new(1, 100_000, 3).unwrap();
        let b = Histogram::new(1, 100_000, 3).unwrap();
        a.record_value(10);
        a.record_value(20);
        b.record_value(20);
        b.record_value(30);

        let dropped = add(&a, &b);
        assert_eq!(0, dropped);
        assert_eq!(4, a.total_count());
        assert_eq!(2, a.count_at_value(20));
    }

    #[test]
    fn add_reports_values_dropped_for_out_of_range_source_samples() {
        let a = Histogram::new(1, 1_000, 3).unwrap();
        let b = Histogram::new(1, 1_000_000, 3).unwrap();
        b.record_value(500);
        b.record_value(500_000);

        let dropped = add(&a, &b);
        assert_eq!(1, dropped);
        assert_eq!(1, a.total_count());
    }

    #[test]
    fn add_with_correction_backfills_into_destination() {
        let a = Histogram::new(1, 1_000, 3).unwrap();
        let b = Histogram::new(1, 1_000, 3).unwrap();
        b.record_value(100);

        add_while_correcting_for_coordinated_omission(&a, &b, 10);
        assert_eq!(10, a.total_count());
    }
}
