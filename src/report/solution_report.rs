//! Report layout of a [`BundleSolutionInfo`].
//!
//! ```text
//! Object = <title>
//!   Id, Name, CreatedAt, RunTime, ControlNetworkFile
//!   Group = Settings
//!   Object = BundleResults
//!     RejectionLimit, Sigma0, Iterations, Converged, NumberObservations,
//!     NumberRejectedObservations, ElapsedTime, NumberImages
//!     Group = RmsImageLineResiduals      (one list entry per image)
//!     Group = RmsImageSampleResiduals
//!     Group = RmsImageResiduals
//!   End_Object
//! End_Object
//! ```
//!
//! Keyword names are part of the external interface: downstream tools parse them, so they
//! live in the constants below and must not be renamed.
use crate::bundle_results::{BundleResults, ResidualAxis};
use crate::bundle_settings::BundleSettings;
use crate::report::{
    format_f64, format_opt_f64, Keyword, ReportGroup, ReportObject, NOT_AVAILABLE,
};
use crate::solution_info::BundleSolutionInfo;
use crate::statistics::Statistics;

pub const ID: &str = "Id";
pub const NAME: &str = "Name";
pub const CREATED_AT: &str = "CreatedAt";
pub const RUN_TIME: &str = "RunTime";
pub const CONTROL_NETWORK_FILE: &str = "ControlNetworkFile";

pub const SETTINGS_GROUP: &str = "Settings";
pub const RESULTS_OBJECT: &str = "BundleResults";

pub const REJECTION_LIMIT: &str = "RejectionLimit";
pub const SIGMA0: &str = "Sigma0";
pub const ITERATIONS: &str = "Iterations";
pub const CONVERGED: &str = "Converged";
pub const NUMBER_OBSERVATIONS: &str = "NumberObservations";
pub const NUMBER_REJECTED_OBSERVATIONS: &str = "NumberRejectedObservations";
pub const ELAPSED_TIME: &str = "ElapsedTime";
pub const NUMBER_IMAGES: &str = "NumberImages";

pub const VALID_PIXELS: &str = "ValidPixels";
pub const TOTAL_PIXELS: &str = "TotalPixels";
pub const AVERAGE: &str = "Average";
pub const STANDARD_DEVIATION: &str = "StandardDeviation";
pub const MINIMUM: &str = "Minimum";
pub const MAXIMUM: &str = "Maximum";
pub const NULL_PIXELS: &str = "NullPixels";
pub const LIS_PIXELS: &str = "LisPixels";
pub const LRS_PIXELS: &str = "LrsPixels";
pub const HIS_PIXELS: &str = "HisPixels";
pub const HRS_PIXELS: &str = "HrsPixels";
pub const UNDER_RANGE_PIXELS: &str = "UnderRangePixels";
pub const OVER_RANGE_PIXELS: &str = "OverRangePixels";
pub const VALID_MINIMUM: &str = "ValidMinimum";
pub const VALID_MAXIMUM: &str = "ValidMaximum";
pub const REMOVED_DATA: &str = "RemovedData";

/// Group name holding the per-image digest of `axis`.
pub fn residual_group_name(axis: ResidualAxis) -> &'static str {
    match axis {
        ResidualAxis::Line => "RmsImageLineResiduals",
        ResidualAxis::Sample => "RmsImageSampleResiduals",
        ResidualAxis::Combined => "RmsImageResiduals",
    }
}

pub(crate) fn build_report(info: &BundleSolutionInfo, title: &str) -> ReportObject {
    let mut root = ReportObject::new(title);
    root.add_keyword(Keyword::scalar(ID, info.id()));
    let name = info.name().or(info.run_time()).unwrap_or(NOT_AVAILABLE);
    root.add_keyword(Keyword::scalar(NAME, name));
    root.add_keyword(Keyword::scalar(CREATED_AT, info.created_at()));
    root.add_keyword(Keyword::scalar(
        RUN_TIME,
        info.run_time().unwrap_or(NOT_AVAILABLE),
    ));
    root.add_keyword(Keyword::scalar(
        CONTROL_NETWORK_FILE,
        info.control_network_file_name(),
    ));
    root.add_group(settings_group(info.settings()));
    root.add_object(results_object(info.bundle_results()));
    root
}

fn settings_group(settings: &BundleSettings) -> ReportGroup {
    let mut group = ReportGroup::new(SETTINGS_GROUP);
    group.add_keyword(Keyword::scalar("ValidateNetwork", settings.validate_network));
    group.add_keyword(Keyword::scalar(
        "SolveObservationMode",
        settings.solve_observation_mode,
    ));
    group.add_keyword(Keyword::scalar("SolveRadius", settings.solve_radius));
    group.add_keyword(Keyword::scalar(
        "ErrorPropagation",
        settings.error_propagation,
    ));
    group.add_keyword(Keyword::scalar(
        "OutlierRejection",
        settings.outlier_rejection,
    ));
    group.add_keyword(Keyword::scalar(
        "OutlierRejectionMultiplier",
        format_f64(settings.outlier_rejection_multiplier),
    ));
    group.add_keyword(Keyword::scalar(
        "ConvergenceCriteria",
        settings.convergence_criteria,
    ));
    group.add_keyword(Keyword::scalar(
        "ConvergenceThreshold",
        format_f64(settings.convergence_threshold),
    ));
    group.add_keyword(Keyword::scalar(
        "MaximumIterations",
        settings.maximum_iterations,
    ));
    group.add_keyword(Keyword::scalar(
        "OutputFilePrefix",
        &settings.output_file_prefix,
    ));
    group
}

fn results_object(results: &BundleResults) -> ReportObject {
    let mut object = ReportObject::new(RESULTS_OBJECT);
    object.add_keyword(Keyword::scalar(
        REJECTION_LIMIT,
        format_f64(results.rejection_limit()),
    ));
    object.add_keyword(Keyword::scalar(SIGMA0, format_f64(results.sigma0())));
    object.add_keyword(Keyword::scalar(ITERATIONS, results.iterations()));
    object.add_keyword(Keyword::scalar(CONVERGED, results.converged()));
    object.add_keyword(Keyword::scalar(
        NUMBER_OBSERVATIONS,
        results.number_observations(),
    ));
    object.add_keyword(Keyword::scalar(
        NUMBER_REJECTED_OBSERVATIONS,
        results.number_rejected_observations(),
    ));
    object.add_keyword(Keyword::scalar(
        ELAPSED_TIME,
        format_f64(results.elapsed_time()),
    ));
    object.add_keyword(Keyword::scalar(NUMBER_IMAGES, results.number_images()));

    for axis in ResidualAxis::ALL {
        object.add_group(residual_group(
            residual_group_name(axis),
            results.residuals(axis),
        ));
    }
    object
}

/// One list keyword per accessor, one list entry per image.
fn residual_group(name: &str, stats: &[Statistics]) -> ReportGroup {
    let counts = |key: &str, get: fn(&Statistics) -> u64| {
        Keyword::list(key, stats.iter().map(get))
    };
    let values = |key: &str, get: fn(&Statistics) -> Option<f64>| {
        Keyword::list(key, stats.iter().map(|s| format_opt_f64(get(s))))
    };

    let mut group = ReportGroup::new(name);
    group.add_keyword(counts(VALID_PIXELS, Statistics::valid_pixels));
    group.add_keyword(counts(TOTAL_PIXELS, Statistics::total_pixels));
    group.add_keyword(values(AVERAGE, Statistics::average));
    group.add_keyword(values(STANDARD_DEVIATION, Statistics::standard_deviation));
    group.add_keyword(values(MINIMUM, Statistics::minimum));
    group.add_keyword(values(MAXIMUM, Statistics::maximum));
    group.add_keyword(counts(NULL_PIXELS, Statistics::null_pixels));
    group.add_keyword(counts(LIS_PIXELS, Statistics::lis_pixels));
    group.add_keyword(counts(LRS_PIXELS, Statistics::lrs_pixels));
    group.add_keyword(counts(HIS_PIXELS, Statistics::his_pixels));
    group.add_keyword(counts(HRS_PIXELS, Statistics::hrs_pixels));
    group.add_keyword(counts(UNDER_RANGE_PIXELS, Statistics::under_range_pixels));
    group.add_keyword(counts(OVER_RANGE_PIXELS, Statistics::over_range_pixels));
    group.add_keyword(Keyword::list(
        VALID_MINIMUM,
        stats.iter().map(|s| format_f64(s.valid_minimum())),
    ));
    group.add_keyword(Keyword::list(
        VALID_MAXIMUM,
        stats.iter().map(|s| format_f64(s.valid_maximum())),
    ));
    group.add_keyword(Keyword::list(
        REMOVED_DATA,
        stats.iter().map(Statistics::removed_data),
    ));
    group
}

#[cfg(test)]
mod solution_report_test {
    use std::sync::Arc;

    use super::*;
    use crate::constants::NULL;

    fn run() -> BundleSolutionInfo {
        let mut results = BundleResults::new();
        results.set_rejection_limit(0.5).unwrap();
        results.add_image_residuals(0, 1.0, 3.0).unwrap();
        results.add_image_residuals(1, NULL, 2.0).unwrap();
        BundleSolutionInfo::new(Arc::new(BundleSettings::default()), "cnetfile.net", results)
            .unwrap()
    }

    #[test]
    fn test_identity_keywords() {
        let info = run();
        let report = info.to_report("DefaultSolutionInfoObject");

        assert_eq!(report.name, "DefaultSolutionInfoObject");
        assert_eq!(
            report.keyword(ID).unwrap().as_scalar(),
            Some(info.id().to_string().as_str())
        );
        assert_eq!(report.keyword(RUN_TIME).unwrap().as_scalar(), Some(NOT_AVAILABLE));
        assert_eq!(report.keyword(NAME).unwrap().as_scalar(), Some(NOT_AVAILABLE));
        assert_eq!(
            report.keyword(CONTROL_NETWORK_FILE).unwrap().as_scalar(),
            Some("cnetfile.net")
        );
        assert!(report.group(SETTINGS_GROUP).is_some());
    }

    #[test]
    fn test_residual_digest() {
        let report = run().to_report("Run");
        let results = report.object(RESULTS_OBJECT).unwrap();
        assert_eq!(
            results.keyword(REJECTION_LIMIT).unwrap().as_scalar(),
            Some("0.5")
        );
        assert_eq!(results.keyword(NUMBER_IMAGES).unwrap().as_scalar(), Some("2"));

        let line = results.group("RmsImageLineResiduals").unwrap();
        let list = |key: &str| line.keyword(key).unwrap().as_list().unwrap().to_vec();
        assert_eq!(list(VALID_PIXELS), vec!["1", "0"]);
        assert_eq!(list(NULL_PIXELS), vec!["0", "1"]);
        assert_eq!(list(AVERAGE), vec!["1", NOT_AVAILABLE]);
        assert_eq!(list(STANDARD_DEVIATION), vec![NOT_AVAILABLE, NOT_AVAILABLE]);

        let combined = results.group("RmsImageResiduals").unwrap();
        assert_eq!(
            combined.keyword(AVERAGE).unwrap().as_list().unwrap(),
            &["2".to_string(), "2".to_string()][..]
        );
        assert_eq!(
            combined.keyword(TOTAL_PIXELS).unwrap().as_list().unwrap(),
            &["2".to_string(), "2".to_string()][..]
        );
    }

    #[test]
    fn test_name_falls_back_to_run_time() {
        let mut info = run();
        info.set_run_time("2024-03-01T10:00:00");
        let name = |info: &BundleSolutionInfo| {
            info.to_report("Run").keyword(NAME).unwrap().as_scalar().map(str::to_string)
        };
        assert_eq!(name(&info).as_deref(), Some("2024-03-01T10:00:00"));
        info.set_name("first pass");
        assert_eq!(name(&info).as_deref(), Some("first pass"));
    }

    #[test]
    fn test_report_is_pure() {
        let info = run();
        assert_eq!(info.to_report("A"), info.to_report("A"));
        assert_eq!(info.to_report("A").to_string(), info.to_report("A").to_string());
    }
}
