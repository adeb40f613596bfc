// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::BucketConfig;

/// Power-of-two bucket a value falls into, clamped to zero for values below
/// the configured resolution.
pub(crate) fn bucket_index(cfg: &BucketConfig, value: u64) -> u32 {
    let pow2_ceiling = 64 - (value | cfg.sub_bucket_mask).leading_zeros();
    let shift = cfg.unit_magnitude + cfg.sub_bucket_half_count_magnitude + 1;
    (pow2_ceiling as i64 - shift as i64).max(0) as u32
}

/// Position within the sub-bucket for `value`, given its bucket index.
pub(crate) fn sub_bucket_index(cfg: &BucketConfig, value: u64, bucket_index: u32) -> u64 {
    value >> (bucket_index + cfg.unit_magnitude)
}

/// Folds a (bucket, sub_bucket) pair into a flat counts-array index, folding
/// the unused lower half of every bucket after the first into bucket zero.
pub(crate) fn counts_index(cfg: &BucketConfig, bucket_index: u32, sub_bucket_index: u64) -> usize {
    let bucket_base_index = ((bucket_index + 1) as u64) << cfg.sub_bucket_half_count_magnitude;
    (bucket_base_index as i64 + sub_bucket_index as i64 - cfg.sub_bucket_half_count as i64) as usize
}

/// Returns `None` when `value` exceeds what this geometry can index (the
/// caller is responsible for bounds-checking against `highest_trackable_value`
/// before recording; this function alone never fails, it may just resolve an
/// index past `counts_len` for values far beyond `highest_trackable_value`).
pub(crate) fn counts_index_for(cfg: &BucketConfig, value: u64) -> usize {
    let bucket = bucket_index(cfg, value);
    let sub_bucket = sub_bucket_index(cfg, value, bucket);
    counts_index(cfg, bucket, sub_bucket)
}

/// Applies the normalizing index offset used by ring-shifted histograms.
pub(crate) fn normalize_index(cfg: &BucketConfig, index: usize, offset: i32) -> usize {
    if offset == 0 {
        return index;
    }
    let len = cfg.counts_len as i64;
    let shifted = index as i64 + offset as i64;
    (((shifted % len) + len) % len) as usize
}

/// Recovers the nominal (lowest) value stored at a counts-array index.
pub(crate) fn value_at_index(cfg: &BucketConfig, index: usize) -> u64 {
    let mut bucket = (index >> cfg.sub_bucket_half_count_magnitude) as i64 - 1;
    let mut sub_bucket =
        (index as u64 & (cfg.sub_bucket_half_count - 1)) + cfg.sub_bucket_half_count;
    if bucket < 0 {
        sub_bucket -= cfg.sub_bucket_half_count;
        bucket = 0;
    }
    sub_bucket << (bucket as u32 + cfg.unit_magnitude)
}

/// Width of the equivalence range that `value` falls into.
pub(crate) fn size_of_equivalent_range(cfg: &BucketConfig, value: u64) -> u64 {
    1 << (bucket_index(cfg, value) + cfg.unit_magnitude)
}

/// Smallest value that maps to the same counts cell as `value`.
pub(crate) fn lowest_equivalent_value(cfg: &BucketConfig, value: u64) -> u64 {
    value_at_index(cfg, counts_index_for(cfg, value))
}

/// Largest value that maps to the same counts cell as `value`.
pub(crate) fn highest_equivalent_value(cfg: &BucketConfig, value: u64) -> u64 {
    lowest_equivalent_value(cfg, value) + size_of_equivalent_range(cfg, value) - 1
}

/// Representative value for the equivalence range containing `value`.
pub(crate) fn median_equivalent_value(cfg: &BucketConfig, value: u64) -> u64 {
    lowest_equivalent_value(cfg, value) + (size_of_equivalent_range(cfg, value) >> 1)
}

/// Smallest value that is *not* equivalent to `value` (saturates at u64::MAX).
pub(crate) fn next_non_equivalent_value(cfg: &BucketConfig, value: u64) -> u64 {
    lowest_equivalent_value(cfg, value).saturating_add(size_of_equivalent_range(cfg, value))
}

/// Two values are equivalent iff they map to the same counts cell.
pub(crate) fn values_are_equivalent(cfg: &BucketConfig, a: u64, b: u64) -> bool {
    counts_index_for(cfg, a) == counts_index_for(cfg, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate_bucket_config;

    fn cfg(lowest: u64, highest: u64, sig_figs: u8) -> BucketConfig {
        calculate_bucket_config(lowest, highest, sig_figs).unwrap()
    }

    #[test]
    fn bucket_and_sub_bucket_unit_magnitude_0() {
        let c = cfg(1, 100_000, 3);
        assert_eq!(0, bucket_index(&c, 3));
        assert_eq!(3, sub_bucket_index(&c, 3, 0));

        assert_eq!(1, bucket_index(&c, 2048 + 3 * 2));
        assert_eq!(1024 + 3, sub_bucket_index(&c, 2048 + 3 * 2, 1));
    }

    #[test]
    fn counts_index_first_and_second_bucket() {
        let c = cfg(1, 100_000, 3);
        assert_eq!(0, counts_index_for(&c, 0));
        assert_eq!(1, counts_index_for(&c, 1));
        assert_eq!(2047, counts_index_for(&c, 2047));
        assert_eq!(2048, counts_index_for(&c, 2048));
        assert_eq!(2048 + 1023, counts_index_for(&c, 2048 + 2047));
    }

    #[test]
    fn value_at_index_round_trips_bucket_starts() {
        let c = cfg(1, 100_000, 3);
        assert_eq!(0, value_at_index(&c, 0));
        assert_eq!(2048 - 1, value_at_index(&c, 2047));
        assert_eq!(2048, value_at_index(&c, 2048));
    }

    #[test]
    fn equivalence_range_grows_with_bucket() {
        let c = cfg(1, 100_000, 3);
        assert_eq!(1, size_of_equivalent_range(&c, 0));
        assert_eq!(1, size_of_equivalent_range(&c, 2047));
        assert_eq!(2, size_of_equivalent_range(&c, 2048));
    }

    #[test]
    fn highest_equivalent_saturates_at_max() {
        let c = cfg(1, u64::MAX, 3);
        assert_eq!(u64::MAX, highest_equivalent_value(&c, u64::MAX));
        assert_eq!(u64::MAX, next_non_equivalent_value(&c, u64::MAX));
    }

    #[test]
    fn values_are_equivalent_within_same_cell() {
        let c = cfg(1, 100_000, 3);
        assert!(values_are_equivalent(&c, 2048, 2049));
        assert!(!values_are_equivalent(&c, 2047, 2048));
    }

    #[test]
    fn normalize_index_wraps_modulo_counts_len() {
        let c = cfg(1, 100_000, 3);
        assert_eq!(5, normalize_index(&c, 5, 0));
        assert_eq!(0, normalize_index(&c, c.counts_len - 1, 1));
    }
}
