mod atomic_file;
pub mod bundle_errors;
pub mod bundle_results;
pub mod bundle_settings;
pub mod constants;
pub mod dataset;
pub mod report;
pub mod solution_info;
pub mod special_pixel;
pub mod statistics;

pub use bundle_errors::BundleError;
pub use bundle_results::{BundleResults, ResidualAxis};
pub use bundle_settings::BundleSettings;
pub use solution_info::{BundleSolutionInfo, RunId};
pub use statistics::Statistics;
