//! # Binary dataset codec
//!
//! One [`BundleSolutionInfo`](crate::solution_info::BundleSolutionInfo) per **Apache Parquet**
//! file. The codec only knows the logical schema below; the physical encoding is left to the
//! `parquet` crate.
//!
//! ## Rows
//!
//! One row per `(image, axis)` accumulator, holding its raw bucket state
//! ([`StatisticsRecord`](crate::statistics::StatisticsRecord)):
//!
//! | column | type |
//! |--------|------|
//! | `image_index` | `UInt32` |
//! | `axis` | `Utf8` (`line`, `sample`, `combined`) |
//! | `valid_minimum`, `valid_maximum`, `sum`, `sum_square` | `Float64` |
//! | `valid_pixels`, `null_pixels`, `lis_pixels`, `lrs_pixels`, `his_pixels`, `hrs_pixels`, `under_range_pixels`, `over_range_pixels` | `UInt64` |
//! | `removed_data` | `Boolean` |
//! | `retained_values` | `List<Float64>` |
//! | `retained_counts` | `List<UInt64>` |
//!
//! ## File metadata
//!
//! Run-level fields are stored as key/value pairs of the Parquet footer, under the
//! [`KEY_PREFIX`] namespace: schema version, id, name, creation epoch (UTC, integer
//! nanoseconds), run time, control network, settings (JSON), the result scalars and the
//! length of each axis list (so empty and uneven lists survive).
//!
//! ## Floating-point policy
//!
//! Bit-exact. Every stored `f64` is either a Parquet `DOUBLE` or a shortest round-trip
//! decimal string, and derived statistics are never stored: they are recomputed from the
//! identical restored state.
//!
//! ## Errors
//!
//! - Missing file or unwritable directory: [`BundleError::IoError`].
//! - Truncated/corrupt file, missing column or key, inconsistent rows:
//!   [`BundleError::DatasetFormat`] naming the path and the problem.
//! - Other schema version: [`BundleError::SchemaVersionMismatch`].
mod reader;
mod writer;

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use camino::Utf8Path;

use crate::bundle_errors::BundleError;

pub(crate) use reader::read_dataset;
pub(crate) use writer::write_dataset;

/// Namespace of every metadata key written by this crate.
pub const KEY_PREFIX: &str = "bundle_stats.";

pub(crate) mod keys {
    pub const SCHEMA_VERSION: &str = "bundle_stats.schema_version";
    pub const RUN_ID: &str = "bundle_stats.run_id";
    pub const NAME: &str = "bundle_stats.name";
    pub const CREATED_AT_UTC_NS: &str = "bundle_stats.created_at_utc_ns";
    pub const RUN_TIME: &str = "bundle_stats.run_time";
    pub const CONTROL_NETWORK: &str = "bundle_stats.control_network";
    pub const SETTINGS: &str = "bundle_stats.settings";
    pub const REJECTION_LIMIT: &str = "bundle_stats.rejection_limit";
    pub const SIGMA0: &str = "bundle_stats.sigma0";
    pub const ITERATIONS: &str = "bundle_stats.iterations";
    pub const CONVERGED: &str = "bundle_stats.converged";
    pub const NUMBER_OBSERVATIONS: &str = "bundle_stats.number_observations";
    pub const NUMBER_REJECTED_OBSERVATIONS: &str = "bundle_stats.number_rejected_observations";
    pub const ELAPSED_TIME: &str = "bundle_stats.elapsed_time";
    pub const LINE_IMAGES: &str = "bundle_stats.line_images";
    pub const SAMPLE_IMAGES: &str = "bundle_stats.sample_images";
    pub const COMBINED_IMAGES: &str = "bundle_stats.combined_images";
}

pub(crate) mod columns {
    pub const IMAGE_INDEX: &str = "image_index";
    pub const AXIS: &str = "axis";
    pub const VALID_MINIMUM: &str = "valid_minimum";
    pub const VALID_MAXIMUM: &str = "valid_maximum";
    pub const SUM: &str = "sum";
    pub const SUM_SQUARE: &str = "sum_square";
    pub const VALID_PIXELS: &str = "valid_pixels";
    pub const NULL_PIXELS: &str = "null_pixels";
    pub const LIS_PIXELS: &str = "lis_pixels";
    pub const LRS_PIXELS: &str = "lrs_pixels";
    pub const HIS_PIXELS: &str = "his_pixels";
    pub const HRS_PIXELS: &str = "hrs_pixels";
    pub const UNDER_RANGE_PIXELS: &str = "under_range_pixels";
    pub const OVER_RANGE_PIXELS: &str = "over_range_pixels";
    pub const REMOVED_DATA: &str = "removed_data";
    pub const RETAINED_VALUES: &str = "retained_values";
    pub const RETAINED_COUNTS: &str = "retained_counts";
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// Arrow schema of the accumulator rows.
pub(crate) fn statistics_schema() -> Schema {
    use columns::*;
    let float = |name| Field::new(name, DataType::Float64, false);
    let count = |name| Field::new(name, DataType::UInt64, false);

    Schema::new(vec![
        Field::new(IMAGE_INDEX, DataType::UInt32, false),
        Field::new(AXIS, DataType::Utf8, false),
        float(VALID_MINIMUM),
        float(VALID_MAXIMUM),
        float(SUM),
        float(SUM_SQUARE),
        count(VALID_PIXELS),
        count(NULL_PIXELS),
        count(LIS_PIXELS),
        count(LRS_PIXELS),
        count(HIS_PIXELS),
        count(HRS_PIXELS),
        count(UNDER_RANGE_PIXELS),
        count(OVER_RANGE_PIXELS),
        Field::new(REMOVED_DATA, DataType::Boolean, false),
        Field::new(RETAINED_VALUES, list_of(DataType::Float64), false),
        Field::new(RETAINED_COUNTS, list_of(DataType::UInt64), false),
    ])
}

pub(crate) fn format_error(path: &Utf8Path, reason: impl ToString) -> BundleError {
    BundleError::DatasetFormat {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod dataset_test {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_schema_columns_are_unique() {
        let schema = statistics_schema();
        assert_eq!(schema.fields().len(), 17);
        assert!(schema.fields().iter().map(|f| f.name()).all_unique());
        assert!(schema.fields().iter().all(|f| !f.is_nullable()));
    }

    #[test]
    fn test_metadata_keys_share_prefix() {
        let all = [
            keys::SCHEMA_VERSION,
            keys::RUN_ID,
            keys::NAME,
            keys::CREATED_AT_UTC_NS,
            keys::RUN_TIME,
            keys::CONTROL_NETWORK,
            keys::SETTINGS,
            keys::REJECTION_LIMIT,
            keys::SIGMA0,
            keys::ITERATIONS,
            keys::CONVERGED,
            keys::NUMBER_OBSERVATIONS,
            keys::NUMBER_REJECTED_OBSERVATIONS,
            keys::ELAPSED_TIME,
            keys::LINE_IMAGES,
            keys::SAMPLE_IMAGES,
            keys::COMBINED_IMAGES,
        ];
        assert!(all.iter().all(|k| k.starts_with(KEY_PREFIX)));
        assert!(all.iter().all_unique());
    }
}
