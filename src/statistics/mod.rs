//! # Incremental residual statistics
//!
//! This module defines [`Statistics`], the accumulator fed one residual at a time by the
//! bundle-adjustment solver. It keeps the running moments needed for the mean and the
//! standard deviation, the extrema of the valid samples, and one counter for every other
//! bucket a sample can fall into (see [`PixelClass`]).
//!
//! ## Buckets
//!
//! | bucket | affects moments and extrema |
//! |--------|-----------------------------|
//! | valid (inside `[valid_minimum, valid_maximum]`) | yes |
//! | under-range / over-range | no |
//! | Null, Lis, Lrs, His, Hrs | no |
//!
//! The bookkeeping invariant is
//! `valid + special + under-range + over-range == added - removed`,
//! which is exactly [`Statistics::total_pixels`].
//!
//! ## Removal
//!
//! [`Statistics::remove_data`] undoes one earlier [`Statistics::add_data`] of the same value.
//! Valid samples are retained in an ordered multiset, so removing the current minimum or
//! maximum yields the extremum of what remains, exactly as if the value had never been
//! added. A removal that would drive any bucket negative fails with
//! [`BundleError::BucketUnderflow`] and leaves the accumulator untouched.
//!
//! The valid range is applied when a sample is added, and narrowing it later does not move
//! samples already counted. A value that now classifies as under- or over-range is therefore
//! taken from the valid samples when the out-of-range bucket is empty and the value is
//! retained.
//!
//! ## Moments
//!
//! The sum and the sum of squares are not running totals: they are folded over the retained
//! multiset in ascending value order every time they are read. Two accumulators holding the
//! same samples report bit-identical moments, whatever the order of the adds, removals and
//! merges that produced them.
//!
//! ## Merging
//!
//! [`Statistics::merge`] combines two accumulators bucket by bucket. It is commutative,
//! associative and has the empty accumulator as identity, which makes it suitable for
//! combining per-worker partial results.
//!
//! ## Example
//!
//! ```rust
//! use bundle_stats::statistics::Statistics;
//! use bundle_stats::constants::NULL;
//!
//! let mut stats = Statistics::new();
//! stats.set_valid_range(0.0, 100.0).unwrap();
//! stats.add_data_slice(&[0.0, 1.0, 2.0, 3.0, NULL, -1.0]);
//!
//! assert_eq!(stats.valid_pixels(), 4);
//! assert_eq!(stats.average(), Some(1.5));
//! assert_eq!(stats.null_pixels(), 1);
//! assert_eq!(stats.under_range_pixels(), 1);
//! assert_eq!(stats.total_pixels(), 6);
//! ```
pub mod record;

use std::collections::BTreeMap;

use log::warn;
use ordered_float::OrderedFloat;

use crate::bundle_errors::BundleError;
use crate::constants::{VALID_MAX, VALID_MIN};
use crate::special_pixel::{PixelClass, SpecialPixel};

pub use record::StatisticsRecord;

/// Per-category counters of special pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialCounts {
    pub null: u64,
    pub lis: u64,
    pub lrs: u64,
    pub his: u64,
    pub hrs: u64,
}

impl SpecialCounts {
    pub fn get(&self, special: SpecialPixel) -> u64 {
        match special {
            SpecialPixel::Null => self.null,
            SpecialPixel::LowInstrumentSaturation => self.lis,
            SpecialPixel::LowRepresentationSaturation => self.lrs,
            SpecialPixel::HighInstrumentSaturation => self.his,
            SpecialPixel::HighRepresentationSaturation => self.hrs,
        }
    }

    fn get_mut(&mut self, special: SpecialPixel) -> &mut u64 {
        match special {
            SpecialPixel::Null => &mut self.null,
            SpecialPixel::LowInstrumentSaturation => &mut self.lis,
            SpecialPixel::LowRepresentationSaturation => &mut self.lrs,
            SpecialPixel::HighInstrumentSaturation => &mut self.his,
            SpecialPixel::HighRepresentationSaturation => &mut self.hrs,
        }
    }

    pub fn total(&self) -> u64 {
        self.null + self.lis + self.lrs + self.his + self.hrs
    }

    fn merge(&mut self, other: &SpecialCounts) {
        self.null += other.null;
        self.lis += other.lis;
        self.lrs += other.lrs;
        self.his += other.his;
        self.hrs += other.hrs;
    }
}

/// Streaming summary of one residual axis of one image.
///
/// Fields
/// -----------------
/// * `valid_minimum`, `valid_maximum` – inclusive range applied at insertion time.
/// * `valid_pixels` – number of retained valid samples.
/// * `specials` – special pixel counters.
/// * `under_range_pixels`, `over_range_pixels` – samples rejected by the valid range.
/// * `removed_data` – set once any sample has been removed.
/// * `retained` – multiset of the valid samples (value → multiplicity); the extrema and
///   the moments are derived from it.
///
/// See also
/// ------------
/// * [`PixelClass::classify`] – The classification applied by [`Statistics::add_data`].
/// * [`StatisticsRecord`] – Flat representation used by the persistence codecs.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    valid_minimum: f64,
    valid_maximum: f64,
    valid_pixels: u64,
    specials: SpecialCounts,
    under_range_pixels: u64,
    over_range_pixels: u64,
    removed_data: bool,
    retained: BTreeMap<OrderedFloat<f64>, u64>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Create an empty accumulator whose valid range spans every non-special value.
    pub fn new() -> Self {
        Statistics {
            valid_minimum: VALID_MIN,
            valid_maximum: VALID_MAX,
            valid_pixels: 0,
            specials: SpecialCounts::default(),
            under_range_pixels: 0,
            over_range_pixels: 0,
            removed_data: false,
            retained: BTreeMap::new(),
        }
    }

    /// Create an empty accumulator restricted to `[minimum, maximum]`.
    pub fn with_valid_range(minimum: f64, maximum: f64) -> Result<Self, BundleError> {
        let mut stats = Statistics::new();
        stats.set_valid_range(minimum, maximum)?;
        Ok(stats)
    }

    /// Set the inclusive range used to classify subsequent samples.
    ///
    /// Samples already accumulated keep the bucket they were assigned when added.
    ///
    /// Arguments
    /// -----------------
    /// * `minimum` – Lowest valid value (inclusive).
    /// * `maximum` – Highest valid value (inclusive).
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::InvalidValidRange)` if `minimum > maximum` or either bound is NaN.
    pub fn set_valid_range(&mut self, minimum: f64, maximum: f64) -> Result<(), BundleError> {
        if minimum.is_nan() || maximum.is_nan() || minimum > maximum {
            return Err(BundleError::InvalidValidRange {
                min: minimum,
                max: maximum,
            });
        }
        self.valid_minimum = minimum;
        self.valid_maximum = maximum;
        Ok(())
    }

    /// Bucket `value` would be counted in, given the current valid range.
    pub fn classify(&self, value: f64) -> PixelClass {
        PixelClass::classify(value, self.valid_minimum, self.valid_maximum)
    }

    /// Add one sample. Never fails: every `f64` has a bucket.
    pub fn add_data(&mut self, value: f64) {
        match self.classify(value) {
            PixelClass::Valid => {
                self.valid_pixels += 1;
                *self.retained.entry(OrderedFloat(value)).or_insert(0) += 1;
            }
            PixelClass::UnderRange => self.under_range_pixels += 1,
            PixelClass::OverRange => self.over_range_pixels += 1,
            PixelClass::Special(special) => *self.specials.get_mut(special) += 1,
        }
    }

    /// Add every sample of `values`, in order.
    pub fn add_data_slice(&mut self, values: &[f64]) {
        values.iter().for_each(|&v| self.add_data(v));
    }

    /// Undo one earlier [`Statistics::add_data`] of `value`.
    ///
    /// The sample is classified against the current valid range, then its bucket is
    /// decremented. For a valid sample the retained multiset loses one occurrence and the
    /// extrema follow from what remains. An under- or over-range value whose bucket is empty
    /// is removed from the retained samples instead, since it was valid when added.
    ///
    /// Arguments
    /// -----------------
    /// * `value` – The sample to remove.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::BucketUnderflow)` if the bucket holds no such sample; the
    ///   accumulator is left unchanged in that case.
    pub fn remove_data(&mut self, value: f64) -> Result<(), BundleError> {
        let bucket = self.classify(value);
        let underflow = BundleError::BucketUnderflow { bucket, value };

        match bucket {
            PixelClass::Valid => self.remove_retained(value).ok_or(underflow)?,
            PixelClass::UnderRange if self.under_range_pixels > 0 => self.under_range_pixels -= 1,
            PixelClass::OverRange if self.over_range_pixels > 0 => self.over_range_pixels -= 1,
            // added as valid before the range was narrowed
            PixelClass::UnderRange | PixelClass::OverRange => {
                self.remove_retained(value).ok_or(underflow)?
            }
            PixelClass::Special(special) => {
                let counter = self.specials.get_mut(special);
                *counter = counter.checked_sub(1).ok_or(underflow)?;
            }
        }

        self.removed_data = true;
        Ok(())
    }

    fn remove_retained(&mut self, value: f64) -> Option<()> {
        let key = OrderedFloat(value);
        let count = self.retained.get_mut(&key)?;
        if *count > 1 {
            *count -= 1;
        } else {
            self.retained.remove(&key);
        }
        self.valid_pixels -= 1;
        Some(())
    }

    /// Combine `other` into `self`, bucket by bucket.
    ///
    /// Counters and the retained multisets are added; the extrema therefore become the
    /// minimum of the minima and the maximum of the maxima, and the moments are those of
    /// the union. An empty operand is the identity. Both operands must share their valid
    /// range unless one of them is empty, in which case the range of the non-empty one is
    /// kept.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::IncompatibleValidRange)` when both operands hold samples and
    ///   their valid ranges differ. `self` is unchanged in that case.
    pub fn merge(&mut self, other: &Statistics) -> Result<(), BundleError> {
        if other.total_pixels() == 0 {
            self.removed_data |= other.removed_data;
            return Ok(());
        }
        if self.total_pixels() == 0 {
            self.valid_minimum = other.valid_minimum;
            self.valid_maximum = other.valid_maximum;
        } else if self.valid_minimum != other.valid_minimum
            || self.valid_maximum != other.valid_maximum
        {
            warn!(
                "refusing to merge statistics over [{}, {}] into [{}, {}]",
                other.valid_minimum, other.valid_maximum, self.valid_minimum, self.valid_maximum
            );
            return Err(BundleError::IncompatibleValidRange(
                self.valid_minimum,
                self.valid_maximum,
                other.valid_minimum,
                other.valid_maximum,
            ));
        }

        self.valid_pixels += other.valid_pixels;
        self.specials.merge(&other.specials);
        self.under_range_pixels += other.under_range_pixels;
        self.over_range_pixels += other.over_range_pixels;
        self.removed_data |= other.removed_data;
        for (value, count) in &other.retained {
            *self.retained.entry(*value).or_insert(0) += count;
        }
        Ok(())
    }

    /// Non-mutating form of [`Statistics::merge`].
    pub fn merged(&self, other: &Statistics) -> Result<Statistics, BundleError> {
        let mut out = self.clone();
        out.merge(other)?;
        Ok(out)
    }

    /// Sum of the valid samples, in ascending value order.
    pub fn sum(&self) -> f64 {
        self.moments().0
    }

    /// Sum of the squared valid samples, in ascending value order.
    pub fn sum_square(&self) -> f64 {
        self.moments().1
    }

    fn moments(&self) -> (f64, f64) {
        self.retained
            .iter()
            .fold((0.0, 0.0), |(s, s2), (value, &count)| {
                let v = value.into_inner();
                let n = count as f64;
                (s + v * n, s2 + v * v * n)
            })
    }

    /// Mean of the valid samples, `None` when there are none.
    pub fn average(&self) -> Option<f64> {
        (self.valid_pixels > 0).then(|| self.sum() / self.valid_pixels as f64)
    }

    /// Sample variance (`n - 1` denominator), `None` below two valid samples.
    pub fn variance(&self) -> Option<f64> {
        if self.valid_pixels < 2 {
            return None;
        }
        let n = self.valid_pixels as f64;
        let (sum, sum_square) = self.moments();
        let var = (sum_square - sum * sum / n) / (n - 1.0);
        // cancellation can leave a tiny negative value
        Some(var.max(0.0))
    }

    pub fn standard_deviation(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Root mean square of the valid samples.
    pub fn rms(&self) -> Option<f64> {
        (self.valid_pixels > 0).then(|| (self.sum_square() / self.valid_pixels as f64).sqrt())
    }

    pub fn minimum(&self) -> Option<f64> {
        self.retained.first_key_value().map(|(v, _)| v.into_inner())
    }

    pub fn maximum(&self) -> Option<f64> {
        self.retained.last_key_value().map(|(v, _)| v.into_inner())
    }

    /// `maximum - minimum` of the valid samples.
    pub fn range(&self) -> Option<f64> {
        Some(self.maximum()? - self.minimum()?)
    }

    /// Number of standard deviations between `value` and the mean.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        let std_dev = self.standard_deviation().filter(|s| *s > 0.0)?;
        Some((value - self.average()?) / std_dev)
    }

    /// Lower bound containing at least `percent` % of the data by Chebyshev's inequality.
    ///
    /// `None` when `percent` is outside `(0, 100)` or the standard deviation is undefined.
    pub fn chebyshev_minimum(&self, percent: f64) -> Option<f64> {
        let k = chebyshev_factor(percent)?;
        Some(self.average()? - k * self.standard_deviation()?)
    }

    /// Upper counterpart of [`Statistics::chebyshev_minimum`].
    pub fn chebyshev_maximum(&self, percent: f64) -> Option<f64> {
        let k = chebyshev_factor(percent)?;
        Some(self.average()? + k * self.standard_deviation()?)
    }

    pub fn valid_minimum(&self) -> f64 {
        self.valid_minimum
    }

    pub fn valid_maximum(&self) -> f64 {
        self.valid_maximum
    }

    pub fn valid_pixels(&self) -> u64 {
        self.valid_pixels
    }

    pub fn special_pixels(&self, special: SpecialPixel) -> u64 {
        self.specials.get(special)
    }

    pub fn special_counts(&self) -> &SpecialCounts {
        &self.specials
    }

    pub fn null_pixels(&self) -> u64 {
        self.specials.null
    }

    pub fn lis_pixels(&self) -> u64 {
        self.specials.lis
    }

    pub fn lrs_pixels(&self) -> u64 {
        self.specials.lrs
    }

    pub fn his_pixels(&self) -> u64 {
        self.specials.his
    }

    pub fn hrs_pixels(&self) -> u64 {
        self.specials.hrs
    }

    pub fn total_special_pixels(&self) -> u64 {
        self.specials.total()
    }

    pub fn under_range_pixels(&self) -> u64 {
        self.under_range_pixels
    }

    pub fn over_range_pixels(&self) -> u64 {
        self.over_range_pixels
    }

    pub fn out_of_range_pixels(&self) -> u64 {
        self.under_range_pixels + self.over_range_pixels
    }

    /// Every sample currently accounted for, whatever its bucket.
    pub fn total_pixels(&self) -> u64 {
        self.valid_pixels + self.specials.total() + self.out_of_range_pixels()
    }

    /// `true` once [`Statistics::remove_data`] has succeeded at least once.
    pub fn removed_data(&self) -> bool {
        self.removed_data
    }
}

fn chebyshev_factor(percent: f64) -> Option<f64> {
    (percent > 0.0 && percent < 100.0).then(|| (1.0 / (1.0 - percent / 100.0)).sqrt())
}
