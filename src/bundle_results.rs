//! # Bundle adjustment results
//!
//! [`BundleResults`] gathers the per-image residual [`Statistics`] of a run on three axes
//! ([`ResidualAxis::Line`], [`ResidualAxis::Sample`] and [`ResidualAxis::Combined`]) together
//! with the scalar outcome of the solve (rejection limit, sigma0, iterations, …).
//!
//! ## Layout
//!
//! ```text
//! BundleResults
//! ├── rejection_limit, sigma0, iterations, converged, observations, elapsed_time
//! ├── rms_image_line_residuals     [Statistics; n_images]
//! ├── rms_image_sample_residuals   [Statistics; n_images]
//! └── rms_image_residuals          [Statistics; n_images]   (line and sample together)
//! ```
//!
//! The three lists are indexed by image position. A finished run has the same number of
//! entries in each ([`BundleResults::is_complete`]); the per-axis setters accept differing
//! lengths so results can be assembled incrementally.
//!
//! ## Updating
//!
//! - [`BundleResults::set_rms_image_residual_lists`] replaces the three lists at once, or not
//!   at all.
//! - [`BundleResults::add_image_residuals`] / [`BundleResults::remove_image_residuals`] feed the
//!   solver output for one observation into all three axes.
//! - [`BundleResults::append`] concatenates the results of a disjoint set of images (e.g.
//!   computed by another worker); [`BundleResults::merge_image_statistics`] folds a partial
//!   accumulator into the one already held for an image.
//!
//! None of these types lock anything: concurrent producers must each own their
//! accumulators and combine them under their own synchronization.
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use crate::bundle_errors::BundleError;
use crate::constants::{ImageIndex, Pixel, Seconds};
use crate::statistics::Statistics;

/// Image-space axis a residual is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResidualAxis {
    Line,
    Sample,
    /// Line and sample residuals accumulated together.
    Combined,
}

impl ResidualAxis {
    pub const ALL: [ResidualAxis; 3] = [
        ResidualAxis::Line,
        ResidualAxis::Sample,
        ResidualAxis::Combined,
    ];

    /// Stable lowercase name, used as the axis tag in binary datasets.
    pub fn name(self) -> &'static str {
        match self {
            ResidualAxis::Line => "line",
            ResidualAxis::Sample => "sample",
            ResidualAxis::Combined => "combined",
        }
    }
}

impl fmt::Display for ResidualAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ResidualAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(ResidualAxis::Line),
            "sample" => Ok(ResidualAxis::Sample),
            "combined" => Ok(ResidualAxis::Combined),
            _ => Err(format!("unknown residual axis '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleResults {
    rejection_limit: f64,
    sigma0: f64,
    iterations: u32,
    converged: bool,
    number_observations: u64,
    number_rejected_observations: u64,
    elapsed_time: Seconds,
    rms_image_line_residuals: Vec<Statistics>,
    rms_image_sample_residuals: Vec<Statistics>,
    rms_image_residuals: Vec<Statistics>,
}

impl Default for BundleResults {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleResults {
    pub fn new() -> Self {
        BundleResults {
            rejection_limit: 0.0,
            sigma0: 0.0,
            iterations: 0,
            converged: false,
            number_observations: 0,
            number_rejected_observations: 0,
            elapsed_time: 0.0,
            rms_image_line_residuals: Vec::new(),
            rms_image_sample_residuals: Vec::new(),
            rms_image_residuals: Vec::new(),
        }
    }

    /// Store the outlier rejection threshold.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::InvalidRejectionLimit)` if `limit` is negative or not finite.
    pub fn set_rejection_limit(&mut self, limit: f64) -> Result<(), BundleError> {
        if !limit.is_finite() || limit < 0.0 {
            return Err(BundleError::InvalidRejectionLimit(limit));
        }
        self.rejection_limit = limit;
        Ok(())
    }

    pub fn rejection_limit(&self) -> f64 {
        self.rejection_limit
    }

    pub fn set_sigma0(&mut self, sigma0: f64) {
        self.sigma0 = sigma0;
    }

    pub fn sigma0(&self) -> f64 {
        self.sigma0
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn set_converged(&mut self, converged: bool) {
        self.converged = converged;
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn set_number_observations(&mut self, count: u64) {
        self.number_observations = count;
    }

    pub fn number_observations(&self) -> u64 {
        self.number_observations
    }

    pub fn set_number_rejected_observations(&mut self, count: u64) {
        self.number_rejected_observations = count;
    }

    pub fn number_rejected_observations(&self) -> u64 {
        self.number_rejected_observations
    }

    pub fn set_elapsed_time(&mut self, seconds: Seconds) {
        self.elapsed_time = seconds;
    }

    pub fn elapsed_time(&self) -> Seconds {
        self.elapsed_time
    }

    /// Replace the three per-image residual lists in one step.
    ///
    /// The lists must have the same length (one accumulator per image). If they do not,
    /// nothing is replaced.
    ///
    /// Arguments
    /// -----------------
    /// * `line` – Line residual statistics, one per image.
    /// * `sample` – Sample residual statistics, one per image.
    /// * `combined` – Combined residual statistics, one per image.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::InconsistentAggregate)` if the lengths differ; the previous
    ///   lists are kept.
    ///
    /// See also
    /// ------------
    /// * [`BundleResults::set_residuals`] – Replace a single axis, without length checks.
    pub fn set_rms_image_residual_lists(
        &mut self,
        line: Vec<Statistics>,
        sample: Vec<Statistics>,
        combined: Vec<Statistics>,
    ) -> Result<(), BundleError> {
        if line.len() != sample.len() || line.len() != combined.len() {
            warn!(
                "rejecting residual lists of unequal length ({}, {}, {})",
                line.len(),
                sample.len(),
                combined.len()
            );
            return Err(BundleError::InconsistentAggregate {
                line: line.len(),
                sample: sample.len(),
                combined: combined.len(),
            });
        }
        self.rms_image_line_residuals = line;
        self.rms_image_sample_residuals = sample;
        self.rms_image_residuals = combined;
        Ok(())
    }

    /// Replace the list of one axis only.
    pub fn set_residuals(&mut self, axis: ResidualAxis, stats: Vec<Statistics>) {
        *self.residuals_vec_mut(axis) = stats;
    }

    pub fn rms_image_line_residuals(&self) -> &[Statistics] {
        &self.rms_image_line_residuals
    }

    pub fn rms_image_sample_residuals(&self) -> &[Statistics] {
        &self.rms_image_sample_residuals
    }

    pub fn rms_image_residuals(&self) -> &[Statistics] {
        &self.rms_image_residuals
    }

    pub fn residuals(&self, axis: ResidualAxis) -> &[Statistics] {
        match axis {
            ResidualAxis::Line => &self.rms_image_line_residuals,
            ResidualAxis::Sample => &self.rms_image_sample_residuals,
            ResidualAxis::Combined => &self.rms_image_residuals,
        }
    }

    fn residuals_vec_mut(&mut self, axis: ResidualAxis) -> &mut Vec<Statistics> {
        match axis {
            ResidualAxis::Line => &mut self.rms_image_line_residuals,
            ResidualAxis::Sample => &mut self.rms_image_sample_residuals,
            ResidualAxis::Combined => &mut self.rms_image_residuals,
        }
    }

    pub fn statistics(&self, axis: ResidualAxis, image: ImageIndex) -> Option<&Statistics> {
        self.residuals(axis).get(image)
    }

    /// Mutable access to one accumulator, for in-place updates.
    pub fn statistics_mut(
        &mut self,
        axis: ResidualAxis,
        image: ImageIndex,
    ) -> Result<&mut Statistics, BundleError> {
        let list = self.residuals_vec_mut(axis);
        let len = list.len();
        list.get_mut(image)
            .ok_or(BundleError::ImageIndexOutOfRange { index: image, len })
    }

    /// Number of images, i.e. the length of the longest list.
    pub fn number_images(&self) -> usize {
        ResidualAxis::ALL
            .iter()
            .map(|axis| self.residuals(*axis).len())
            .max()
            .unwrap_or(0)
    }

    /// `true` when the three lists hold one accumulator per image.
    pub fn is_complete(&self) -> bool {
        let n = self.rms_image_line_residuals.len();
        self.rms_image_sample_residuals.len() == n && self.rms_image_residuals.len() == n
    }

    /// Grow every list with empty accumulators up to `count` images.
    /// Lists already longer than `count` are left alone.
    pub fn ensure_images(&mut self, count: usize) {
        for axis in ResidualAxis::ALL {
            let list = self.residuals_vec_mut(axis);
            if list.len() < count {
                list.resize_with(count, Statistics::new);
            }
        }
    }

    /// Feed the residuals of one observation of `image`.
    ///
    /// `line` goes to the line axis, `sample` to the sample axis, and both to the
    /// combined axis. The lists are grown as needed so that `image` exists on every axis.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::ImageIndexOutOfRange)` if `image` is the largest `usize`, which
    ///   no list can be grown to hold. Nothing is changed in that case.
    pub fn add_image_residuals(
        &mut self,
        image: ImageIndex,
        line: Pixel,
        sample: Pixel,
    ) -> Result<(), BundleError> {
        let count = image
            .checked_add(1)
            .ok_or_else(|| BundleError::ImageIndexOutOfRange {
                index: image,
                len: self.number_images(),
            })?;
        self.ensure_images(count);
        self.rms_image_line_residuals[image].add_data(line);
        self.rms_image_sample_residuals[image].add_data(sample);
        let combined = &mut self.rms_image_residuals[image];
        combined.add_data(line);
        combined.add_data(sample);
        Ok(())
    }

    /// Inverse of [`BundleResults::add_image_residuals`].
    ///
    /// Either every axis is updated or none is.
    pub fn remove_image_residuals(
        &mut self,
        image: ImageIndex,
        line: Pixel,
        sample: Pixel,
    ) -> Result<(), BundleError> {
        let mut line_stats = self.statistics_mut(ResidualAxis::Line, image)?.clone();
        let mut sample_stats = self.statistics_mut(ResidualAxis::Sample, image)?.clone();
        let mut combined_stats = self.statistics_mut(ResidualAxis::Combined, image)?.clone();

        line_stats.remove_data(line)?;
        sample_stats.remove_data(sample)?;
        combined_stats.remove_data(line)?;
        combined_stats.remove_data(sample)?;

        self.rms_image_line_residuals[image] = line_stats;
        self.rms_image_sample_residuals[image] = sample_stats;
        self.rms_image_residuals[image] = combined_stats;
        Ok(())
    }

    /// Fold `partial` into the accumulator held for `image` on `axis`.
    ///
    /// See [`Statistics::merge`] for the combine rule.
    pub fn merge_image_statistics(
        &mut self,
        axis: ResidualAxis,
        image: ImageIndex,
        partial: &Statistics,
    ) -> Result<(), BundleError> {
        self.statistics_mut(axis, image)?.merge(partial)
    }

    /// Concatenate the per-image lists of `other`, which covers a disjoint set of images
    /// placed after the images of `self`.
    ///
    /// Image order is preserved on every axis. The observation counters are summed; the
    /// other run scalars of `self` are kept.
    ///
    /// Return
    /// ----------
    /// * `Err(BundleError::InconsistentAggregate)` if either operand is not complete, since
    ///   concatenation would then shift images between axes. Nothing is changed.
    pub fn append(&mut self, other: BundleResults) -> Result<(), BundleError> {
        for results in [&*self, &other] {
            if !results.is_complete() {
                warn!("refusing to append incomplete residual lists");
                return Err(BundleError::InconsistentAggregate {
                    line: results.rms_image_line_residuals.len(),
                    sample: results.rms_image_sample_residuals.len(),
                    combined: results.rms_image_residuals.len(),
                });
            }
        }

        debug!(
            "appending {} images to {} existing images",
            other.number_images(),
            self.number_images()
        );
        self.rms_image_line_residuals
            .extend(other.rms_image_line_residuals);
        self.rms_image_sample_residuals
            .extend(other.rms_image_sample_residuals);
        self.rms_image_residuals.extend(other.rms_image_residuals);
        self.number_observations += other.number_observations;
        self.number_rejected_observations += other.number_rejected_observations;
        Ok(())
    }
}
