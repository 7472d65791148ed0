//! # Bundle adjustment settings
//!
//! [`BundleSettings`] is the configuration snapshot a run was solved with. The results
//! layer never interprets it: it is shared through an `Arc`, rendered into the report and
//! stored verbatim (as JSON) in the binary dataset so an imported run still knows how it
//! was produced.
//!
//! ## Loading
//!
//! ```rust,no_run
//! use bundle_stats::bundle_settings::BundleSettings;
//! use camino::Utf8Path;
//!
//! let settings = BundleSettings::from_json_file(Utf8Path::new("bundle.json")).unwrap();
//! assert!(settings.maximum_iterations > 0);
//! ```
//!
//! Every field has a default, so a configuration file only needs the values that differ.
//! JSON has no representation for NaN or infinities, so the floating-point fields must be
//! finite before the settings can be stored (see [`BundleSettings::validate`]).
use std::fmt;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::bundle_errors::BundleError;

/// Quantity tested against [`BundleSettings::convergence_threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceCriteria {
    Sigma0,
    ParameterCorrections,
}

impl fmt::Display for ConvergenceCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceCriteria::Sigma0 => write!(f, "Sigma0"),
            ConvergenceCriteria::ParameterCorrections => write!(f, "ParameterCorrections"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    pub validate_network: bool,
    pub solve_observation_mode: bool,
    pub solve_radius: bool,
    pub error_propagation: bool,
    pub outlier_rejection: bool,
    pub outlier_rejection_multiplier: f64,
    pub convergence_criteria: ConvergenceCriteria,
    pub convergence_threshold: f64,
    pub maximum_iterations: u32,
    pub output_file_prefix: String,
}

impl Default for BundleSettings {
    fn default() -> Self {
        BundleSettings {
            validate_network: true,
            solve_observation_mode: false,
            solve_radius: false,
            error_propagation: false,
            outlier_rejection: false,
            outlier_rejection_multiplier: 3.0,
            convergence_criteria: ConvergenceCriteria::Sigma0,
            convergence_threshold: 1.0e-10,
            maximum_iterations: 50,
            output_file_prefix: String::new(),
        }
    }
}

impl BundleSettings {
    /// Parse settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, BundleError> {
        let settings: BundleSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a JSON settings file.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::IoError)` if the file cannot be read.
    /// * `Err(BundleError::SettingsError)` if it is not valid settings JSON.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, BundleError> {
        let contents = fs::read_to_string(path)?;
        let settings: BundleSettings = serde_json::from_str(&contents)
            .map_err(|e| BundleError::SettingsError(format!("Failed to parse {path}: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every floating-point field is finite.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::SettingsError)` naming the first NaN or infinite field.
    pub fn validate(&self) -> Result<(), BundleError> {
        let floats = [
            (
                "outlier_rejection_multiplier",
                self.outlier_rejection_multiplier,
            ),
            ("convergence_threshold", self.convergence_threshold),
        ];
        match floats.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(BundleError::SettingsError(format!(
                "{name} must be finite, got {value}"
            ))),
            None => Ok(()),
        }
    }

    /// Compact JSON form, as stored in binary datasets.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::SettingsError)` if a field cannot be stored as JSON.
    pub fn to_json(&self) -> Result<String, BundleError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}
