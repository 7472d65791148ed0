//! # Constants and type definitions for bundle-stats
//!
//! This module centralizes the **special pixel sentinels**, the **dataset schema version**,
//! and the **type aliases** shared by the accumulator, the results container and the
//! persistence codecs.
//!
//! ## Overview
//!
//! - Reserved `f64` codes standing for "no data" and saturated measurements
//! - Bounds of the representable valid range
//! - Schema version written into every binary dataset
//! - Common type aliases used across the crate
//!
//! The five sentinels are the five most negative finite doubles, in the bit layout used by
//! ISIS cubes: [`VALID_MIN`] ends in `FA`, then Null, Lrs, Lis, His and Hrs up to
//! `-f64::MAX`. Any value strictly below [`VALID_MIN`] that is not one of them can only
//! be `-inf`.

// -------------------------------------------------------------------------------------------------
// Special pixel sentinels
// -------------------------------------------------------------------------------------------------

/// Smallest value that is not a special pixel
pub const VALID_MIN: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFA);

/// "No data" sentinel
pub const NULL: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFB);

/// Low representation saturation sentinel
pub const LOW_REPR_SAT: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFC);

/// Low instrument saturation sentinel
pub const LOW_INSTR_SAT: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFD);

/// High instrument saturation sentinel
pub const HIGH_INSTR_SAT: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFE);

/// High representation saturation sentinel (`-f64::MAX`)
pub const HIGH_REPR_SAT: f64 = f64::from_bits(0xFFEF_FFFF_FFFF_FFFF);

/// Largest finite value
pub const VALID_MAX: f64 = f64::MAX;

// -------------------------------------------------------------------------------------------------
// Persistence
// -------------------------------------------------------------------------------------------------

/// Version of the logical schema stored in binary datasets.
/// Bump whenever a column or metadata key changes meaning.
pub const DATASET_SCHEMA_VERSION: u32 = 1;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Zero-based position of an image inside a run
pub type ImageIndex = usize;

/// Residual magnitude in pixels
pub type Pixel = f64;

/// Wall-clock duration in seconds
pub type Seconds = f64;
