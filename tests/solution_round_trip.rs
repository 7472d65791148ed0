mod common;

use std::fs;
use std::sync::Arc;

use arrow_array::{Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use bundle_stats::bundle_settings::ConvergenceCriteria;
use bundle_stats::constants::{HIGH_INSTR_SAT, NULL};
use bundle_stats::report::solution_report::{
    residual_group_name, AVERAGE, REJECTION_LIMIT, RESULTS_OBJECT,
};
use bundle_stats::{
    BundleError, BundleResults, BundleSettings, BundleSolutionInfo, ResidualAxis, Statistics,
};
use camino::Utf8Path;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::common::{reference_statistics, scratch_dir};

/// Rejection limit 0.5, two images with one accumulator per axis.
fn two_image_run() -> BundleSolutionInfo {
    let mut results = BundleResults::new();
    results.set_rejection_limit(0.5).unwrap();
    results.add_image_residuals(0, 0.125, -0.75).unwrap();
    results.add_image_residuals(0, 0.1, 0.2).unwrap();
    results.add_image_residuals(1, NULL, 1.0 / 3.0).unwrap();
    results.add_image_residuals(1, -2.5e-7, HIGH_INSTR_SAT).unwrap();
    results.set_sigma0(0.731);
    results.set_iterations(7);
    results.set_converged(true);
    results.set_number_observations(8);
    results.set_elapsed_time(12.25);

    let settings = BundleSettings {
        outlier_rejection: true,
        convergence_criteria: ConvergenceCriteria::ParameterCorrections,
        output_file_prefix: "run one/".to_string(),
        ..BundleSettings::default()
    };
    let mut run =
        BundleSolutionInfo::new(Arc::new(settings), "data/cnetfile.net", results).unwrap();
    run.set_run_time("2024-03-01T10:00:00");
    run
}

fn default_run(control_network: &str) -> BundleSolutionInfo {
    BundleSolutionInfo::new(
        Arc::new(BundleSettings::default()),
        control_network,
        BundleResults::new(),
    )
    .unwrap()
}

#[test]
fn binary_round_trip_preserves_report() {
    let dir = scratch_dir("round_trip");
    let path = dir.join("run.parquet");
    let run = two_image_run();

    run.export_binary(&path).unwrap();
    let restored = BundleSolutionInfo::import_binary(&path).unwrap();

    let report = restored.to_report("Run");
    let results = report.object(RESULTS_OBJECT).unwrap();
    assert_eq!(
        results.keyword(REJECTION_LIMIT).unwrap().as_scalar(),
        Some("0.5")
    );
    assert_eq!(restored.bundle_results().rejection_limit(), 0.5);
    assert_eq!(report, run.to_report("Run"));
    assert_eq!(report.to_string(), run.to_report("Run").to_string());
    assert_eq!(restored, run);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn binary_round_trip_is_bit_exact() {
    let dir = scratch_dir("bit_exact");
    let path = dir.join("run.parquet");
    let run = two_image_run();

    run.export_binary(&path).unwrap();
    let restored = BundleSolutionInfo::import_binary(&path).unwrap();

    assert_eq!(restored.id(), run.id());
    assert_eq!(restored.created_at(), run.created_at());
    assert_eq!(restored.run_time(), Some("2024-03-01T10:00:00"));
    assert_eq!(restored.name(), None);
    assert_eq!(
        restored.control_network_file_name(),
        Utf8Path::new("data/cnetfile.net")
    );
    assert_eq!(**restored.settings(), **run.settings());
    for axis in ResidualAxis::ALL {
        for (a, b) in restored
            .bundle_results()
            .residuals(axis)
            .iter()
            .zip(run.bundle_results().residuals(axis))
        {
            assert_eq!(a.sum().to_bits(), b.sum().to_bits());
            assert_eq!(a.sum_square().to_bits(), b.sum_square().to_bits());
            assert_eq!(a.special_counts(), b.special_counts());
        }
    }

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn round_trip_keeps_partial_and_removed_state() {
    let dir = scratch_dir("partial");
    let path = dir.join("run.parquet");

    let mut results = BundleResults::new();
    let mut reference = reference_statistics();
    reference.remove_data(3.0).unwrap();
    results.set_residuals(
        ResidualAxis::Line,
        vec![reference.clone(), Statistics::new()],
    );
    results.set_residuals(ResidualAxis::Combined, vec![reference]);
    let mut run =
        BundleSolutionInfo::new(Arc::new(BundleSettings::default()), "cnet.net", results)
            .unwrap();
    run.set_name("partial");

    run.export_binary(&path).unwrap();
    let restored = BundleSolutionInfo::import_binary(&path).unwrap();
    assert_eq!(restored, run);
    assert!(!restored.bundle_results().is_complete());
    assert!(restored.bundle_results().rms_image_sample_residuals().is_empty());
    assert_eq!(restored.name(), Some("partial"));

    let line = &restored.bundle_results().rms_image_line_residuals()[0];
    assert!(line.removed_data());
    assert_eq!(line.maximum(), Some(2.0));
    assert_eq!(line.valid_minimum(), 0.0);
    assert_eq!(line.valid_maximum(), 100.0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn empty_results_round_trip() {
    let dir = scratch_dir("empty");
    let path = dir.join("run.parquet");
    let run = default_run("cnet.net");

    run.export_binary(&path).unwrap();
    let restored = BundleSolutionInfo::import_binary(&path).unwrap();
    assert_eq!(restored, run);
    assert_eq!(restored.bundle_results().number_images(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn export_overwrites_previous_dataset() {
    let dir = scratch_dir("overwrite");
    let path = dir.join("run.parquet");
    let first = two_image_run();
    let second = default_run("other.net");

    first.export_binary(&path).unwrap();
    second.export_binary(&path).unwrap();
    assert_eq!(BundleSolutionInfo::import_binary(&path).unwrap(), second);
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
#[allow(clippy::redundant_clone)]
fn self_assignment_keeps_report() {
    let mut run = two_image_run();
    let before = run.to_report("Run");
    run = run.clone();
    assert_eq!(run.to_report("Run"), before);
}

#[test]
fn report_export_matches_rendering() {
    let dir = scratch_dir("report");
    let path = dir.join("run.pvl");
    let run = two_image_run();

    run.export_report(&path, "Run").unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, run.to_report("Run").to_string());
    assert!(text.starts_with("Object = Run"));
    assert!(text.contains("Group = RmsImageLineResiduals"));
    assert!(text.contains("OutputFilePrefix = \"run one/\""));

    let combined = run.to_report("Run");
    let combined = combined
        .object(RESULTS_OBJECT)
        .unwrap()
        .group(residual_group_name(ResidualAxis::Combined))
        .unwrap();
    assert_eq!(combined.keyword(AVERAGE).unwrap().as_list().unwrap().len(), 2);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn export_into_missing_directory_fails() {
    let dir = scratch_dir("missing_dir");
    let path = dir.join("absent").join("run.parquet");
    let run = two_image_run();

    assert!(matches!(
        run.export_binary(&path),
        Err(BundleError::IoError(_))
    ));
    assert!(matches!(
        run.export_report(&path, "Run"),
        Err(BundleError::IoError(_))
    ));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn import_missing_file_fails() {
    let dir = scratch_dir("missing_file");
    let err = BundleSolutionInfo::import_binary(&dir.join("nothing.parquet")).unwrap_err();
    assert!(matches!(err, BundleError::IoError(_)));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn import_truncated_file_fails() {
    let dir = scratch_dir("truncated");
    let path = dir.join("run.parquet");
    two_image_run().export_binary(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    let err = BundleSolutionInfo::import_binary(&path).unwrap_err();
    assert!(matches!(err, BundleError::DatasetFormat { .. }), "{err:?}");

    fs::write(&path, b"not a dataset").unwrap();
    let err = BundleSolutionInfo::import_binary(&path).unwrap_err();
    assert!(matches!(err, BundleError::DatasetFormat { .. }), "{err:?}");

    fs::remove_dir_all(dir).unwrap();
}

/// Parquet file with a single dummy column and the given footer metadata.
fn write_foreign_parquet(path: &Utf8Path, metadata: Vec<KeyValue>) {
    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int32, false)]));
    let batch =
        RecordBatch::try_new(schema.clone(), vec![Arc::new(Int32Array::from(vec![1, 2]))])
            .unwrap();
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(metadata))
        .build();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

#[test]
fn import_other_schema_version_fails() {
    let dir = scratch_dir("version");
    let path = dir.join("future.parquet");

    write_foreign_parquet(
        &path,
        vec![KeyValue::new(
            "bundle_stats.schema_version".to_string(),
            "999".to_string(),
        )],
    );
    match BundleSolutionInfo::import_binary(&path) {
        Err(BundleError::SchemaVersionMismatch { expected, found, .. }) => {
            assert_eq!(expected, 1);
            assert_eq!(found, "999");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    write_foreign_parquet(&path, Vec::new());
    assert!(matches!(
        BundleSolutionInfo::import_binary(&path),
        Err(BundleError::SchemaVersionMismatch { .. })
    ));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn export_rejects_non_finite_settings() {
    let dir = scratch_dir("non_finite_settings");
    let path = dir.join("run.parquet");
    let settings = BundleSettings {
        outlier_rejection_multiplier: f64::NAN,
        ..BundleSettings::default()
    };
    let run = BundleSolutionInfo::new(Arc::new(settings), "cnet.net", BundleResults::new())
        .unwrap();

    assert!(matches!(
        run.export_binary(&path),
        Err(BundleError::SettingsError(_))
    ));
    assert!(!path.exists());

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn import_rejects_oversized_declared_lists() {
    let dir = scratch_dir("declared_lists");
    let exported = dir.join("run.parquet");
    two_image_run().export_binary(&exported).unwrap();

    let footer: Vec<KeyValue> = {
        let builder = ParquetRecordBatchReaderBuilder::try_new(fs::File::open(&exported).unwrap())
            .unwrap();
        builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .unwrap()
            .iter()
            .filter(|kv| kv.key.starts_with("bundle_stats."))
            .map(|kv| {
                if kv.key == "bundle_stats.line_images" {
                    KeyValue::new(kv.key.clone(), usize::MAX.to_string())
                } else {
                    kv.clone()
                }
            })
            .collect()
    };
    let crafted = dir.join("crafted.parquet");
    write_foreign_parquet(&crafted, footer);

    let err = BundleSolutionInfo::import_binary(&crafted).unwrap_err();
    assert!(matches!(err, BundleError::DatasetFormat { .. }), "{err:?}");

    fs::remove_dir_all(dir).unwrap();
}
