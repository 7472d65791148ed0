use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::str::FromStr;
use std::sync::Arc;

use arrow_array::{
    Array, BooleanArray, Float64Array, ListArray, RecordBatch, StringArray, UInt32Array,
    UInt64Array,
};
use camino::{Utf8Path, Utf8PathBuf};
use hifitime::{Duration, Epoch, TimeScale};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::metadata::KeyValue;

use super::{columns, format_error, keys};
use crate::bundle_errors::BundleError;
use crate::bundle_results::{BundleResults, ResidualAxis};
use crate::bundle_settings::BundleSettings;
use crate::constants::DATASET_SCHEMA_VERSION;
use crate::solution_info::{BundleSolutionInfo, RunId};
use crate::statistics::{Statistics, StatisticsRecord};

const BATCH_SIZE: usize = 1024;

/// Key/value pairs of the Parquet footer.
struct Footer<'a> {
    path: &'a Utf8Path,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Footer<'a> {
    fn new(path: &'a Utf8Path, kv: Option<&'a Vec<KeyValue>>) -> Self {
        let values = kv
            .into_iter()
            .flatten()
            .filter_map(|entry| Some((entry.key.as_str(), entry.value.as_deref()?)))
            .collect();
        Footer { path, values }
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.to_string())
    }

    fn required(&self, key: &str) -> Result<&'a str, BundleError> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| format_error(self.path, format!("missing metadata key '{key}'")))
    }

    fn parse<T>(&self, key: &str) -> Result<T, BundleError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required(key)?;
        raw.parse()
            .map_err(|e| format_error(self.path, format!("metadata key '{key}' = '{raw}': {e}")))
    }

    /// Line, sample and combined list lengths, which together must account for every row.
    fn declared_lengths(&self, num_rows: i64) -> Result<[usize; 3], BundleError> {
        let lengths: [usize; 3] = [
            self.parse(keys::LINE_IMAGES)?,
            self.parse(keys::SAMPLE_IMAGES)?,
            self.parse(keys::COMBINED_IMAGES)?,
        ];
        let declared = lengths
            .iter()
            .try_fold(0usize, |total, &n| total.checked_add(n));
        let rows = usize::try_from(num_rows).ok();
        match (declared, rows) {
            (Some(declared), Some(rows)) if declared == rows => Ok(lengths),
            _ => Err(format_error(
                self.path,
                format!(
                    "declared list lengths {lengths:?} do not match the {num_rows} rows of the file"
                ),
            )),
        }
    }

    fn check_schema_version(&self) -> Result<(), BundleError> {
        let found = self.values.get(keys::SCHEMA_VERSION).copied();
        match found {
            Some(v) if v == DATASET_SCHEMA_VERSION.to_string() => Ok(()),
            other => Err(BundleError::SchemaVersionMismatch {
                path: self.path.to_string(),
                expected: DATASET_SCHEMA_VERSION,
                found: other.unwrap_or("<missing>").to_string(),
            }),
        }
    }
}

/// Decoded accumulators, one slot per `(axis, image)`; each slot is filled exactly once.
struct Slots {
    axes: [Vec<Option<Statistics>>; 3],
}

fn axis_slot(axis: ResidualAxis) -> usize {
    match axis {
        ResidualAxis::Line => 0,
        ResidualAxis::Sample => 1,
        ResidualAxis::Combined => 2,
    }
}

impl Slots {
    fn new(line: usize, sample: usize, combined: usize) -> Self {
        Slots {
            axes: [vec![None; line], vec![None; sample], vec![None; combined]],
        }
    }

    fn fill(
        &mut self,
        axis: ResidualAxis,
        image: usize,
        stats: Statistics,
        path: &Utf8Path,
    ) -> Result<(), BundleError> {
        let list = &mut self.axes[axis_slot(axis)];
        let len = list.len();
        let slot = list.get_mut(image).ok_or_else(|| {
            format_error(
                path,
                format!("{axis} row for image {image} but only {len} images declared"),
            )
        })?;
        if slot.is_some() {
            return Err(format_error(
                path,
                format!("duplicate {axis} row for image {image}"),
            ));
        }
        *slot = Some(stats);
        Ok(())
    }

    fn into_lists(self, path: &Utf8Path) -> Result<[Vec<Statistics>; 3], BundleError> {
        let [line, sample, combined] = self.axes;
        let complete = |axis: ResidualAxis, list: Vec<Option<Statistics>>| {
            list.into_iter()
                .enumerate()
                .map(|(image, slot)| {
                    slot.ok_or_else(|| {
                        format_error(path, format!("missing {axis} row for image {image}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok([
            complete(ResidualAxis::Line, line)?,
            complete(ResidualAxis::Sample, sample)?,
            complete(ResidualAxis::Combined, combined)?,
        ])
    }
}

/// Typed, null-free view of a column of `batch`.
fn column<'b, A: Array + 'static>(
    batch: &'b RecordBatch,
    name: &str,
    path: &Utf8Path,
) -> Result<&'b A, BundleError> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| format_error(path, format!("missing column '{name}'")))?;
    if array.null_count() > 0 {
        return Err(format_error(path, format!("null entries in column '{name}'")));
    }
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        format_error(
            path,
            format!("column '{name}' has unexpected type {}", array.data_type()),
        )
    })
}

fn list_values<A, T>(
    list: &ListArray,
    row: usize,
    name: &str,
    path: &Utf8Path,
    values: impl Fn(&A) -> Vec<T>,
) -> Result<Vec<T>, BundleError>
where
    A: Array + 'static,
{
    let items = list.value(row);
    if items.null_count() > 0 {
        return Err(format_error(path, format!("null items in column '{name}'")));
    }
    items
        .as_any()
        .downcast_ref::<A>()
        .map(values)
        .ok_or_else(|| format_error(path, format!("column '{name}' has unexpected item type")))
}

fn read_batch(batch: &RecordBatch, path: &Utf8Path, slots: &mut Slots) -> Result<(), BundleError> {
    use columns::*;

    let image_index = column::<UInt32Array>(batch, IMAGE_INDEX, path)?;
    let axis_tag = column::<StringArray>(batch, AXIS, path)?;
    let float = |name: &str| column::<Float64Array>(batch, name, path);
    let count = |name: &str| column::<UInt64Array>(batch, name, path);
    let (valid_minimum, valid_maximum) = (float(VALID_MINIMUM)?, float(VALID_MAXIMUM)?);
    let (sum, sum_square) = (float(SUM)?, float(SUM_SQUARE)?);
    let valid_pixels = count(VALID_PIXELS)?;
    let null_pixels = count(NULL_PIXELS)?;
    let lis_pixels = count(LIS_PIXELS)?;
    let lrs_pixels = count(LRS_PIXELS)?;
    let his_pixels = count(HIS_PIXELS)?;
    let hrs_pixels = count(HRS_PIXELS)?;
    let under_range_pixels = count(UNDER_RANGE_PIXELS)?;
    let over_range_pixels = count(OVER_RANGE_PIXELS)?;
    let removed_data = column::<BooleanArray>(batch, REMOVED_DATA, path)?;
    let retained_values = column::<ListArray>(batch, RETAINED_VALUES, path)?;
    let retained_counts = column::<ListArray>(batch, RETAINED_COUNTS, path)?;

    for row in 0..batch.num_rows() {
        let axis: ResidualAxis = axis_tag
            .value(row)
            .parse()
            .map_err(|e| format_error(path, e))?;
        let image = image_index.value(row) as usize;

        let record = StatisticsRecord {
            valid_minimum: valid_minimum.value(row),
            valid_maximum: valid_maximum.value(row),
            sum: sum.value(row),
            sum_square: sum_square.value(row),
            valid_pixels: valid_pixels.value(row),
            null_pixels: null_pixels.value(row),
            lis_pixels: lis_pixels.value(row),
            lrs_pixels: lrs_pixels.value(row),
            his_pixels: his_pixels.value(row),
            hrs_pixels: hrs_pixels.value(row),
            under_range_pixels: under_range_pixels.value(row),
            over_range_pixels: over_range_pixels.value(row),
            removed_data: removed_data.value(row),
            retained_values: list_values(
                retained_values,
                row,
                RETAINED_VALUES,
                path,
                |a: &Float64Array| a.values().to_vec(),
            )?,
            retained_counts: list_values(
                retained_counts,
                row,
                RETAINED_COUNTS,
                path,
                |a: &UInt64Array| a.values().to_vec(),
            )?,
        };
        let stats = Statistics::try_from(record)
            .map_err(|reason| format_error(path, format!("{axis} image {image}: {reason}")))?;
        slots.fill(axis, image, stats, path)?;
    }
    Ok(())
}

fn results_from_footer(
    footer: &Footer<'_>,
    lists: [Vec<Statistics>; 3],
) -> Result<BundleResults, BundleError> {
    let mut results = BundleResults::new();
    results
        .set_rejection_limit(footer.parse(keys::REJECTION_LIMIT)?)
        .map_err(|e| format_error(footer.path, e))?;
    results.set_sigma0(footer.parse(keys::SIGMA0)?);
    results.set_iterations(footer.parse(keys::ITERATIONS)?);
    results.set_converged(footer.parse(keys::CONVERGED)?);
    results.set_number_observations(footer.parse(keys::NUMBER_OBSERVATIONS)?);
    results.set_number_rejected_observations(footer.parse(keys::NUMBER_REJECTED_OBSERVATIONS)?);
    results.set_elapsed_time(footer.parse(keys::ELAPSED_TIME)?);

    // per axis: a stored run may legitimately hold lists of different lengths
    let [line, sample, combined] = lists;
    results.set_residuals(ResidualAxis::Line, line);
    results.set_residuals(ResidualAxis::Sample, sample);
    results.set_residuals(ResidualAxis::Combined, combined);
    Ok(results)
}

/// Rebuild a [`BundleSolutionInfo`] from the Parquet dataset at `path`.
pub(crate) fn read_dataset(path: &Utf8Path) -> Result<BundleSolutionInfo, BundleError> {
    let file = File::open(path)?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| format_error(path, e))?;

    let file_metadata = builder.metadata().file_metadata().clone();
    let footer = Footer::new(path, file_metadata.key_value_metadata());
    footer.check_schema_version()?;

    let id: RunId = footer
        .required(keys::RUN_ID)?
        .parse()
        .map_err(|e: BundleError| format_error(path, e))?;
    let created_at = Epoch::from_duration(
        Duration::from_total_nanoseconds(footer.parse::<i128>(keys::CREATED_AT_UTC_NS)?),
        TimeScale::UTC,
    );
    let settings = BundleSettings::from_json_str(footer.required(keys::SETTINGS)?)
        .map_err(|e| format_error(path, e))?;
    let control_network = Utf8PathBuf::from(footer.required(keys::CONTROL_NETWORK)?);

    let [line, sample, combined] = footer.declared_lengths(file_metadata.num_rows())?;
    let mut slots = Slots::new(line, sample, combined);
    let reader = builder
        .with_batch_size(BATCH_SIZE)
        .build()
        .map_err(|e| format_error(path, e))?;
    for maybe_batch in reader {
        let batch = maybe_batch.map_err(|e| format_error(path, e))?;
        read_batch(&batch, path, &mut slots)?;
    }
    let results = results_from_footer(&footer, slots.into_lists(path)?)?;

    debug!(
        "imported run {id} ({} images) from {path}",
        results.number_images()
    );
    Ok(BundleSolutionInfo::from_parts(
        id,
        footer.optional(keys::NAME),
        created_at,
        footer.optional(keys::RUN_TIME),
        control_network,
        Arc::new(settings),
        results,
    ))
}
