#![allow(dead_code)]

use std::fs;

use approx::assert_relative_eq;
use bundle_stats::constants::{HIGH_INSTR_SAT, HIGH_REPR_SAT, LOW_INSTR_SAT, LOW_REPR_SAT, NULL};
use bundle_stats::Statistics;
use camino::Utf8PathBuf;

/// Fresh directory under the system temp dir; the caller removes it.
pub fn scratch_dir(label: &str) -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap();
    let dir = base.join(format!(
        "bundle_stats_{label}_{:08x}",
        rand::random::<u32>()
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// The 22-sample accumulator: `{0, 1, 2, 3}` valid, one Null, two Lis, three Lrs,
/// four His, five Hrs, `-1` below and `1001, 1002` above the range `[0, 100]`.
pub fn reference_statistics() -> Statistics {
    let mut stats = Statistics::with_valid_range(0.0, 100.0).unwrap();
    stats.add_data_slice(&[0.0, 1.0, 2.0, 3.0]);
    stats.add_data(NULL);
    stats.add_data_slice(&[LOW_INSTR_SAT; 2]);
    stats.add_data_slice(&[LOW_REPR_SAT; 3]);
    stats.add_data_slice(&[HIGH_INSTR_SAT; 4]);
    stats.add_data_slice(&[HIGH_REPR_SAT; 5]);
    stats.add_data_slice(&[-1.0, 1001.0, 1002.0]);
    stats
}

/// Bucket counters must match exactly, moments up to `epsilon`.
pub fn assert_statistics_close(actual: &Statistics, expected: &Statistics, epsilon: f64) {
    assert_eq!(actual.valid_pixels(), expected.valid_pixels());
    assert_eq!(actual.special_counts(), expected.special_counts());
    assert_eq!(actual.under_range_pixels(), expected.under_range_pixels());
    assert_eq!(actual.over_range_pixels(), expected.over_range_pixels());
    assert_eq!(actual.minimum(), expected.minimum());
    assert_eq!(actual.maximum(), expected.maximum());
    assert_relative_eq!(actual.sum(), expected.sum(), epsilon = epsilon);
    assert_relative_eq!(actual.sum_square(), expected.sum_square(), epsilon = epsilon);
}
