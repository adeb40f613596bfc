// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Iteration over a [`Histogram`]'s recorded values.
//!
//! The upstream C/Java implementations this core is modeled on drive
//! iteration through a union-tagged cursor dispatched via a function
//! pointer. Here that becomes a single [`HistogramIterator`] cursor carrying
//! a tagged [`Discipline`] enum and a polymorphic `next`, which keeps the
//! unified cursor contract without the indirection.

use crate::Histogram;

/// One reported step of iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationValue {
    /// Exclusive lower bound of the range this step covers (the
    /// `value_iterated_to` of the previous step, or 0 for the first step).
    pub value_iterated_from: u64,
    /// Inclusive upper bound of the range this step covers.
    pub value_iterated_to: u64,
    /// Count stored in the underlying cell at `value_iterated_to`.
    pub count_at_value_iterated_to: u64,
    /// Samples added to the running total during this step.
    pub count_since_last_iteration: u64,
    /// Running total of samples seen so far, inclusive of this step.
    pub cumulative_count: u64,
    /// `cumulative_count / total_count`, as a percentage.
    pub percentile: f64,
}

#[derive(Clone, Copy)]
enum Discipline {
    Raw,
    Recorded,
    Linear {
        value_units_per_bucket: u64,
        boundary: u64,
    },
    Logarithmic {
        log_base: f64,
        level: f64,
    },
    Percentile {
        ticks_per_half_distance: u32,
        percentile_to_iterate_to: f64,
        seen_last_value: bool,
    },
}

/// A cursor over a histogram's recorded values. Produced by
/// [`Histogram::iter_raw`], [`Histogram::iter_recorded`],
/// [`Histogram::iter_linear`], [`Histogram::iter_log`], and
/// [`Histogram::iter_percentiles`].
///
/// Snapshots `total_count` when constructed; like every other query, it is
/// only weakly consistent with concurrent recorders.
pub struct HistogramIterator<'a> {
    histogram: &'a Histogram,
    total_count: u64,
    current_index: usize,
    cumulative_count: u64,
    value_iterated_to: u64,
    ended: bool,
    discipline: Discipline,
}

impl<'a> HistogramIterator<'a> {
    pub(crate) fn raw(histogram: &'a Histogram) -> Self {
        Self::new(histogram, Discipline::Raw)
    }

    pub(crate) fn recorded(histogram: &'a Histogram) -> Self {
        Self::new(histogram, Discipline::Recorded)
    }

    pub(crate) fn linear(histogram: &'a Histogram, value_units_per_bucket: u64) -> Self {
        assert!(value_units_per_bucket > 0, "step must be positive");
        Self::new(
            histogram,
            Discipline::Linear {
                value_units_per_bucket,
                boundary: value_units_per_bucket - 1,
            },
        )
    }

    pub(crate) fn log(histogram: &'a Histogram, value_units_first_bucket: f64, log_base: f64) -> Self {
        assert!(value_units_first_bucket > 0.0 && log_base > 1.0);
        Self::new(
            histogram,
            Discipline::Logarithmic {
                log_base,
                level: value_units_first_bucket,
            },
        )
    }

    pub(crate) fn percentiles(histogram: &'a Histogram, ticks_per_half_distance: u32) -> Self {
        assert!(ticks_per_half_distance > 0);
        Self::new(
            histogram,
            Discipline::Percentile {
                ticks_per_half_distance,
                percentile_to_iterate_to: 0.0,
                seen_last_value: false,
            },
        )
    }

    fn new(histogram: &'a Histogram, discipline: Discipline) -> Self {
        HistogramIterator {
            histogram,
            total_count: histogram.total_count(),
            current_index: 0,
            cumulative_count: 0,
            value_iterated_to: 0,
            ended: false,
            discipline,
        }
    }

    fn make_value(&mut self, value_iterated_to: u64, count_since_last: u64) -> IterationValue {
        let from = self.value_iterated_to;
        self.value_iterated_to = value_iterated_to;
        let percentile = if self.total_count == 0 {
            0.0
        } else {
            100.0 * self.cumulative_count as f64 / self.total_count as f64
        };
        IterationValue {
            value_iterated_from: from,
            value_iterated_to,
            count_at_value_iterated_to: self
                .histogram
                .count_at_value(value_iterated_to),
            count_since_last_iteration: count_since_last,
            cumulative_count: self.cumulative_count,
            percentile,
        }
    }

    fn counts_len(&self) -> usize {
        self.histogram.config().counts_len()
    }
}

impl<'a> Iterator for HistogramIterator<'a> {
    type Item = IterationValue;

    fn next(&mut self) -> Option<IterationValue> {
        if self.ended {
            return None;
        }
        if self.cumulative_count >= self.total_count {
            self.ended = true;
            return None;
        }

        match self.discipline {
            Discipline::Raw => self.next_raw(),
            Discipline::Recorded => self.next_recorded(),
            Discipline::Linear { .. } => self.next_linear(),
            Discipline::Logarithmic { .. } => self.next_log(),
            Discipline::Percentile { .. } => self.next_percentile(),
        }
    }
}

impl<'a> HistogramIterator<'a> {
    fn next_raw(&mut self) -> Option<IterationValue> {
        if self.current_index >= self.counts_len() {
            self.ended = true;
            return None;
        }
        let count = self.histogram.count_at_index(self.current_index);
        let value = self.histogram.value_at_index(self.current_index);
        let highest = self.histogram.highest_equivalent_value(value);
        self.cumulative_count += count;
        self.current_index += 1;
        if self.cumulative_count >= self.total_count {
            self.ended = true;
        }
        Some(self.make_value(highest, count))
    }

    fn next_recorded(&mut self) -> Option<IterationValue> {
        loop {
            if self.current_index >= self.counts_len() {
                self.ended = true;
                return None;
            }
            let count = self.histogram.count_at_index(self.current_index);
            let value = self.histogram.value_at_index(self.current_index);
            self.current_index += 1;
            if count == 0 {
                continue;
            }
            let highest = self.histogram.highest_equivalent_value(value);
            self.cumulative_count += count;
            if self.cumulative_count >= self.total_count {
                self.ended = true;
            }
            return Some(self.make_value(highest, count));
        }
    }

    fn next_linear(&mut self) -> Option<IterationValue> {
        let (step, boundary) = match self.discipline {
            Discipline::Linear {
                value_units_per_bucket,
                boundary,
            } => (value_units_per_bucket, boundary),
            _ => unreachable!(),
        };

        let mut count_added = 0u64;
        let len = self.counts_len();
        while self.current_index < len {
            let value = self.histogram.value_at_index(self.current_index);
            if value > boundary {
                break;
            }
            count_added += self.histogram.count_at_index(self.current_index);
            self.current_index += 1;
        }
        self.cumulative_count += count_added;
        if self.current_index >= len || self.cumulative_count >= self.total_count {
            self.ended = self.current_index >= len;
        }
        let result = self.make_value(boundary, count_added);
        if let Discipline::Linear {
            value_units_per_bucket,
            ..
        } = self.discipline
        {
            self.discipline = Discipline::Linear {
                value_units_per_bucket,
                boundary: boundary + step,
            };
        }
        if self.cumulative_count >= self.total_count {
            self.ended = true;
        }
        Some(result)
    }

    fn next_log(&mut self) -> Option<IterationValue> {
        let (log_base, level) = match self.discipline {
            Discipline::Logarithmic { log_base, level } => (log_base, level),
            _ => unreachable!(),
        };
        let boundary = (level.max(1.0) as u64).saturating_sub(1);

        let mut count_added = 0u64;
        let len = self.counts_len();
        while self.current_index < len {
            let value = self.histogram.value_at_index(self.current_index);
            if value > boundary {
                break;
            }
            count_added += self.histogram.count_at_index(self.current_index);
            self.current_index += 1;
        }
        self.cumulative_count += count_added;
        let result = self.make_value(boundary, count_added);
        self.discipline = Discipline::Logarithmic {
            log_base,
            level: level * log_base,
        };
        if self.current_index >= len || self.cumulative_count >= self.total_count {
            self.ended = true;
        }
        Some(result)
    }

    fn next_percentile(&mut self) -> Option<IterationValue> {
        let len = self.counts_len();
        loop {
            if self.current_index >= len {
                self.ended = true;
                return None;
            }
            let count = self.histogram.count_at_index(self.current_index);
            let value = self.histogram.value_at_index(self.current_index);
            self.cumulative_count += count;
            let highest = self.histogram.highest_equivalent_value(value);
            self.current_index += 1;

            let is_last_nonzero = self.cumulative_count >= self.total_count;
            let current_pct = if self.total_count == 0 {
                100.0
            } else {
                100.0 * self.cumulative_count as f64 / self.total_count as f64
            };

            let (ticks_per_half_distance, percentile_to_iterate_to, seen_last_value) =
                match self.discipline {
                    Discipline::Percentile {
                        ticks_per_half_distance,
                        percentile_to_iterate_to,
                        seen_last_value,
                    } => (ticks_per_half_distance, percentile_to_iterate_to, seen_last_value),
                    _ => unreachable!(),
                };

            if count == 0 && !(is_last_nonzero && !seen_last_value) {
                continue;
            }

            if current_pct >= percentile_to_iterate_to || (is_last_nonzero && !seen_last_value) {
                let next_target =
                    next_percentile_to_iterate_to(current_pct.min(100.0), ticks_per_half_distance);
                self.discipline = Discipline::Percentile {
                    ticks_per_half_distance,
                    percentile_to_iterate_to: next_target,
                    seen_last_value: seen_last_value || is_last_nonzero,
                };
                if is_last_nonzero {
                    self.ended = true;
                }
                return Some(self.make_value(highest, count));
            }
        }
    }
}

/// Computes the next percentile boundary to stop at, tightening
/// exponentially as we approach 100%.
fn next_percentile_to_iterate_to(current_percentile: f64, ticks_per_half_distance: u32) -> f64 {
    if current_percentile >= 100.0 {
        return 100.0;
    }
    let ratio = 100.0 / (100.0 - current_percentile);
    let halving_steps = ratio.log2().floor().max(0.0) as u32;
    let ticks = (1u64 << halving_steps) * ticks_per_half_distance as u64;
    (current_percentile + 100.0 / ticks as f64).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_raw_iterator_yields_nothing() {
        let h = Histogram::new(1, 1000, 3).unwrap();
        assert_eq!(0, HistogramIterator::raw(&h).count());
        assert_eq!(0, HistogramIterator::recorded(&h).count());
    }

    #[test]
    fn recorded_iterator_skips_empty_cells() {
        let h = Histogram::new(1, u64::MAX, 3).unwrap();
        h.record_value(1);
        h.record_value(1_000);
        h.record_value(1_000_000);

        let values: Vec<u64> = HistogramIterator::recorded(&h)
            .map(|iv| iv.value_iterated_to)
            .collect();
        assert_eq!(
            vec![1, 1_000, h.highest_equivalent_value(1_000_000)],
            values
        );
    }

    #[test]
    fn linear_iterator_aggregates_per_step() {
        let h = Histogram::new(1, u64::MAX, 3).unwrap();
        h.record_value(100);
        h.record_value(201);
        h.record_value(205);

        let steps: Vec<(u64, u64)> = HistogramIterator::linear(&h, 100)
            .map(|iv| (iv.value_iterated_to, iv.count_since_last_iteration))
            .collect();
        assert_eq!((99, 0), steps[0]);
        assert_eq!((199, 1), steps[1]);
        assert_eq!((299, 2), steps[2]);
    }

    #[test]
    fn percentile_iterator_reaches_100_and_sees_max_once() {
        let h = Histogram::new(1, u64::MAX, 3).unwrap();
        for v in 1..=1000u64 {
            h.record_value(v);
        }
        let last = HistogramIterator::percentiles(&h, 5).last().unwrap();
        assert!((last.percentile - 100.0).abs() < 1e-9);
        assert_eq!(h.highest_equivalent_value(1000), last.value_iterated_to);
    }

    #[test]
    fn log_iterator_advances_geometrically() {
        let h = Histogram::new(1, u64::MAX, 3).unwrap();
        h.record_value(1);
        h.record_value(50);
        h.record_value(900);

        let steps: Vec<u64> = HistogramIterator::log(&h, 10.0, 10.0)
            .map(|iv| iv.value_iterated_to)
            .collect();
        // boundaries at 9, 99, 999, ...
        assert_eq!(vec![9, 99, 999], steps);
    }
}
