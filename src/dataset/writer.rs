use std::sync::Arc;

use arrow_array::types::{Float64Type, UInt64Type};
use arrow_array::{
    ArrayRef, BooleanArray, Float64Array, ListArray, RecordBatch, StringArray, UInt32Array,
    UInt64Array,
};
use camino::Utf8Path;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use super::{format_error, keys, statistics_schema};
use crate::atomic_file::write_atomically;
use crate::bundle_errors::BundleError;
use crate::bundle_results::{BundleResults, ResidualAxis};
use crate::constants::DATASET_SCHEMA_VERSION;
use crate::solution_info::BundleSolutionInfo;
use crate::statistics::StatisticsRecord;

/// Accumulator rows in column order, flattened axis by axis.
struct Rows {
    image_index: Vec<u32>,
    axis: Vec<&'static str>,
    records: Vec<StatisticsRecord>,
}

fn collect_rows(results: &BundleResults, path: &Utf8Path) -> Result<Rows, BundleError> {
    let mut rows = Rows {
        image_index: Vec::new(),
        axis: Vec::new(),
        records: Vec::new(),
    };
    for axis in ResidualAxis::ALL {
        for (index, stats) in results.residuals(axis).iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| format_error(path, format!("image index {index} exceeds u32")))?;
            rows.image_index.push(index);
            rows.axis.push(axis.name());
            rows.records.push(StatisticsRecord::from(stats));
        }
    }
    Ok(rows)
}

fn record_batch(rows: Rows) -> Result<RecordBatch, BundleError> {
    let Rows {
        image_index,
        axis,
        records,
    } = rows;
    let records = &records;
    let float = |get: fn(&StatisticsRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(records.iter().map(get)))
    };
    let count = |get: fn(&StatisticsRecord) -> u64| -> ArrayRef {
        Arc::new(UInt64Array::from_iter_values(records.iter().map(get)))
    };

    let retained_values = ListArray::from_iter_primitive::<Float64Type, _, _>(
        records
            .iter()
            .map(|r| Some(r.retained_values.iter().copied().map(Some))),
    );
    let retained_counts = ListArray::from_iter_primitive::<UInt64Type, _, _>(
        records
            .iter()
            .map(|r| Some(r.retained_counts.iter().copied().map(Some))),
    );

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(image_index)),
        Arc::new(StringArray::from(axis)),
        float(|r| r.valid_minimum),
        float(|r| r.valid_maximum),
        float(|r| r.sum),
        float(|r| r.sum_square),
        count(|r| r.valid_pixels),
        count(|r| r.null_pixels),
        count(|r| r.lis_pixels),
        count(|r| r.lrs_pixels),
        count(|r| r.his_pixels),
        count(|r| r.hrs_pixels),
        count(|r| r.under_range_pixels),
        count(|r| r.over_range_pixels),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.removed_data).collect::<Vec<_>>(),
        )),
        Arc::new(retained_values),
        Arc::new(retained_counts),
    ];

    Ok(RecordBatch::try_new(Arc::new(statistics_schema()), columns)?)
}

fn run_metadata(info: &BundleSolutionInfo) -> Result<Vec<KeyValue>, BundleError> {
    let results = info.bundle_results();
    let mut kv = vec![
        KeyValue::new(
            keys::SCHEMA_VERSION.to_string(),
            DATASET_SCHEMA_VERSION.to_string(),
        ),
        KeyValue::new(keys::RUN_ID.to_string(), info.id().to_string()),
        KeyValue::new(
            keys::CREATED_AT_UTC_NS.to_string(),
            info.created_at().duration.total_nanoseconds().to_string(),
        ),
        KeyValue::new(
            keys::CONTROL_NETWORK.to_string(),
            info.control_network_file_name().to_string(),
        ),
        KeyValue::new(keys::SETTINGS.to_string(), info.settings().to_json()?),
        KeyValue::new(
            keys::REJECTION_LIMIT.to_string(),
            results.rejection_limit().to_string(),
        ),
        KeyValue::new(keys::SIGMA0.to_string(), results.sigma0().to_string()),
        KeyValue::new(keys::ITERATIONS.to_string(), results.iterations().to_string()),
        KeyValue::new(keys::CONVERGED.to_string(), results.converged().to_string()),
        KeyValue::new(
            keys::NUMBER_OBSERVATIONS.to_string(),
            results.number_observations().to_string(),
        ),
        KeyValue::new(
            keys::NUMBER_REJECTED_OBSERVATIONS.to_string(),
            results.number_rejected_observations().to_string(),
        ),
        KeyValue::new(
            keys::ELAPSED_TIME.to_string(),
            results.elapsed_time().to_string(),
        ),
        KeyValue::new(
            keys::LINE_IMAGES.to_string(),
            results.rms_image_line_residuals().len().to_string(),
        ),
        KeyValue::new(
            keys::SAMPLE_IMAGES.to_string(),
            results.rms_image_sample_residuals().len().to_string(),
        ),
        KeyValue::new(
            keys::COMBINED_IMAGES.to_string(),
            results.rms_image_residuals().len().to_string(),
        ),
    ];
    // absent optional fields are simply not written
    if let Some(name) = info.name() {
        kv.push(KeyValue::new(keys::NAME.to_string(), name.to_string()));
    }
    if let Some(run_time) = info.run_time() {
        kv.push(KeyValue::new(keys::RUN_TIME.to_string(), run_time.to_string()));
    }
    Ok(kv)
}

/// Serialize `info` to a Parquet dataset at `path` (atomic replace).
pub(crate) fn write_dataset(info: &BundleSolutionInfo, path: &Utf8Path) -> Result<(), BundleError> {
    let rows = collect_rows(info.bundle_results(), path)?;
    let n_rows = rows.records.len();
    let batch = record_batch(rows)?;
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(run_metadata(info)?))
        .build();

    write_atomically(path, |file| {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })?;

    debug!(
        "exported run {} ({n_rows} accumulator rows) to {path}",
        info.id()
    );
    Ok(())
}
