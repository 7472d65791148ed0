//! Flat, codec-neutral snapshot of a [`Statistics`] accumulator.
//!
//! Both persistence codecs go through [`StatisticsRecord`]: it holds the raw bucket state
//! (never the derived statistics), so restoring it reproduces the accumulator bit for bit.
//! The moments are stored alongside the retained samples for readers of the raw file; on
//! restore they must equal the moments folded from those samples.
use ordered_float::OrderedFloat;

use super::{SpecialCounts, Statistics};
use crate::special_pixel::is_special;

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRecord {
    pub valid_minimum: f64,
    pub valid_maximum: f64,
    pub sum: f64,
    pub sum_square: f64,
    pub valid_pixels: u64,
    pub null_pixels: u64,
    pub lis_pixels: u64,
    pub lrs_pixels: u64,
    pub his_pixels: u64,
    pub hrs_pixels: u64,
    pub under_range_pixels: u64,
    pub over_range_pixels: u64,
    pub removed_data: bool,
    /// Distinct retained valid samples, strictly increasing.
    pub retained_values: Vec<f64>,
    /// Multiplicity of each entry of `retained_values`.
    pub retained_counts: Vec<u64>,
}

impl From<&Statistics> for StatisticsRecord {
    fn from(stats: &Statistics) -> Self {
        let (retained_values, retained_counts) = stats
            .retained
            .iter()
            .map(|(value, count)| (value.into_inner(), *count))
            .unzip();

        StatisticsRecord {
            valid_minimum: stats.valid_minimum,
            valid_maximum: stats.valid_maximum,
            sum: stats.sum(),
            sum_square: stats.sum_square(),
            valid_pixels: stats.valid_pixels,
            null_pixels: stats.specials.null,
            lis_pixels: stats.specials.lis,
            lrs_pixels: stats.specials.lrs,
            his_pixels: stats.specials.his,
            hrs_pixels: stats.specials.hrs,
            under_range_pixels: stats.under_range_pixels,
            over_range_pixels: stats.over_range_pixels,
            removed_data: stats.removed_data,
            retained_values,
            retained_counts,
        }
    }
}

impl TryFrom<StatisticsRecord> for Statistics {
    type Error = String;

    /// Rebuild an accumulator, checking that the record is self-consistent.
    fn try_from(record: StatisticsRecord) -> Result<Self, Self::Error> {
        if record.valid_minimum.is_nan()
            || record.valid_maximum.is_nan()
            || record.valid_minimum > record.valid_maximum
        {
            return Err(format!(
                "invalid valid range [{}, {}]",
                record.valid_minimum, record.valid_maximum
            ));
        }
        if record.retained_values.len() != record.retained_counts.len() {
            return Err(format!(
                "{} retained values but {} multiplicities",
                record.retained_values.len(),
                record.retained_counts.len()
            ));
        }
        if record.retained_counts.contains(&0) {
            return Err("retained value with zero multiplicity".to_string());
        }
        if record.retained_values.iter().any(|v| is_special(*v)) {
            return Err("special pixel stored as a retained valid value".to_string());
        }
        if record.retained_values.windows(2).any(|w| w[0] >= w[1]) {
            return Err("retained values are not strictly increasing".to_string());
        }
        let retained_total: u64 = record.retained_counts.iter().sum();
        if retained_total != record.valid_pixels {
            return Err(format!(
                "valid pixel count {} does not match {} retained samples",
                record.valid_pixels, retained_total
            ));
        }

        let stats = Statistics {
            valid_minimum: record.valid_minimum,
            valid_maximum: record.valid_maximum,
            valid_pixels: record.valid_pixels,
            specials: SpecialCounts {
                null: record.null_pixels,
                lis: record.lis_pixels,
                lrs: record.lrs_pixels,
                his: record.his_pixels,
                hrs: record.hrs_pixels,
            },
            under_range_pixels: record.under_range_pixels,
            over_range_pixels: record.over_range_pixels,
            removed_data: record.removed_data,
            retained: record
                .retained_values
                .into_iter()
                .map(OrderedFloat)
                .zip(record.retained_counts)
                .collect(),
        };
        if stats.sum().to_bits() != record.sum.to_bits()
            || stats.sum_square().to_bits() != record.sum_square.to_bits()
        {
            return Err(format!(
                "stored moments ({}, {}) do not match the retained samples ({}, {})",
                record.sum,
                record.sum_square,
                stats.sum(),
                stats.sum_square()
            ));
        }
        Ok(stats)
    }
}
