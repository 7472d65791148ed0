//! # Bundle solution info
//!
//! [`BundleSolutionInfo`] is the record of one bundle-adjustment run: who it is
//! ([`RunId`], creation epoch, run-time label), what it was computed from (the shared
//! [`BundleSettings`] and the control-network path, both passed through untouched) and
//! what it produced (an owned [`BundleResults`]).
//!
//! ## Persistence
//!
//! A record has two independent external forms, both built from the same state:
//!
//! - a structured text report, [`BundleSolutionInfo::to_report`] /
//!   [`BundleSolutionInfo::export_report`];
//! - a binary Parquet dataset, [`BundleSolutionInfo::export_binary`] /
//!   [`BundleSolutionInfo::import_binary`], which restores every stored field bit for bit.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bundle_stats::{BundleResults, BundleSettings, BundleSolutionInfo};
//! use camino::Utf8Path;
//!
//! let mut results = BundleResults::new();
//! results.set_rejection_limit(0.5).unwrap();
//! results.add_image_residuals(0, 0.12, -0.31).unwrap();
//!
//! let mut run = BundleSolutionInfo::new(Arc::new(BundleSettings::default()), "cnet.net", results)
//!     .unwrap();
//! run.set_run_time("2024-03-01T10:00:00");
//!
//! run.export_binary(Utf8Path::new("run.parquet")).unwrap();
//! let restored = BundleSolutionInfo::import_binary(Utf8Path::new("run.parquet")).unwrap();
//! assert_eq!(restored.to_report("Run"), run.to_report("Run"));
//! ```
//!
//! ## Identity
//!
//! The id is drawn at construction and never changes. Cloning keeps it: a clone is the
//! same run, and compares equal to the original.
use std::fmt;
use std::io::{BufWriter, Write};
use std::str::FromStr;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use hifitime::{Epoch, TimeScale};
use log::debug;

use crate::atomic_file::write_atomically;
use crate::bundle_errors::BundleError;
use crate::bundle_results::BundleResults;
use crate::bundle_settings::BundleSettings;
use crate::dataset;
use crate::report::{solution_report, ReportObject};

/// Random 128-bit run identifier, rendered as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u128);

impl RunId {
    pub fn generate() -> Self {
        RunId(rand::random())
    }

    pub fn from_u128(value: u128) -> Self {
        RunId(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:032x}", self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl FromStr for RunId {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != '-').collect();
        if digits.len() != 32 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BundleError::InvalidRunId(s.to_string()));
        }
        u128::from_str_radix(&digits, 16)
            .map(RunId)
            .map_err(|_| BundleError::InvalidRunId(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleSolutionInfo {
    id: RunId,
    name: Option<String>,
    created_at: Epoch,
    run_time: Option<String>,
    control_network: Utf8PathBuf,
    settings: Arc<BundleSettings>,
    results: BundleResults,
}

impl BundleSolutionInfo {
    /// Create the record of a new run.
    ///
    /// A fresh [`RunId`] is drawn and the creation epoch is read from the system clock
    /// (UTC). The run-time label stays unset until [`BundleSolutionInfo::set_run_time`].
    ///
    /// Arguments
    /// -----------------
    /// * `settings` – Configuration the run was solved with (shared, not copied).
    /// * `control_network` – Path of the control-network file used as input.
    /// * `results` – Statistics produced by the run; owned by the record from now on.
    ///
    /// Return
    /// ----------
    /// * The new record, or `Err(BundleError::ClockError)` if the system time is unavailable.
    pub fn new(
        settings: Arc<BundleSettings>,
        control_network: impl Into<Utf8PathBuf>,
        results: BundleResults,
    ) -> Result<Self, BundleError> {
        let created_at = Epoch::now()?.to_time_scale(TimeScale::UTC);
        Ok(BundleSolutionInfo {
            id: RunId::generate(),
            name: None,
            created_at,
            run_time: None,
            control_network: control_network.into(),
            settings,
            results,
        })
    }

    /// Reassemble a record whose identity is already known (dataset import).
    pub(crate) fn from_parts(
        id: RunId,
        name: Option<String>,
        created_at: Epoch,
        run_time: Option<String>,
        control_network: Utf8PathBuf,
        settings: Arc<BundleSettings>,
        results: BundleResults,
    ) -> Self {
        BundleSolutionInfo {
            id,
            name,
            created_at,
            run_time,
            control_network,
            settings,
            results,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn created_at(&self) -> Epoch {
        self.created_at
    }

    /// Opaque run-time label; its format is the caller's business.
    pub fn set_run_time(&mut self, run_time: impl Into<String>) {
        self.run_time = Some(run_time.into());
    }

    pub fn run_time(&self) -> Option<&str> {
        self.run_time.as_deref()
    }

    pub fn control_network_file_name(&self) -> &Utf8Path {
        &self.control_network
    }

    pub fn settings(&self) -> &Arc<BundleSettings> {
        &self.settings
    }

    pub fn bundle_results(&self) -> &BundleResults {
        &self.results
    }

    pub fn bundle_results_mut(&mut self) -> &mut BundleResults {
        &mut self.results
    }

    /// Replace the results of the run.
    pub fn set_output_statistics(&mut self, results: BundleResults) {
        self.results = results;
    }

    /// Project the record into a structured report named `title`.
    ///
    /// Pure: the record is not modified and the same state always yields the same report.
    ///
    /// See also
    /// ------------
    /// * [`solution_report`] – Layout and keyword names.
    pub fn to_report(&self, title: &str) -> ReportObject {
        solution_report::build_report(self, title)
    }

    /// Write the rendered report of the record to `path`, atomically.
    pub fn export_report(&self, path: &Utf8Path, title: &str) -> Result<(), BundleError> {
        let report = self.to_report(title);
        write_atomically(path, |file| {
            let mut out = BufWriter::new(file);
            write!(out, "{report}")?;
            out.flush()?;
            Ok(())
        })?;
        debug!("exported report of run {} to {path}", self.id);
        Ok(())
    }

    /// Serialize the whole record to a Parquet dataset at `path`, overwriting it.
    ///
    /// The file only appears once completely written.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::IoError)` if the parent directory is missing or not writable.
    ///
    /// See also
    /// ------------
    /// * [`BundleSolutionInfo::import_binary`] – The inverse operation.
    /// * [`dataset`] – Logical schema of the file.
    pub fn export_binary(&self, path: &Utf8Path) -> Result<(), BundleError> {
        dataset::write_dataset(self, path)
    }

    /// Rebuild a record from a dataset written by [`BundleSolutionInfo::export_binary`].
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::IoError)` if the file cannot be opened.
    /// * `Err(BundleError::DatasetFormat)` if it is truncated or not a valid dataset.
    /// * `Err(BundleError::SchemaVersionMismatch)` if it was written with another schema.
    pub fn import_binary(path: &Utf8Path) -> Result<Self, BundleError> {
        dataset::read_dataset(path)
    }
}
