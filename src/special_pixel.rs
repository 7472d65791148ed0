//! # Sample classification
//!
//! Every `f64` handed to a [`Statistics`](crate::statistics::Statistics) accumulator lands in
//! exactly one [`PixelClass`]. The special categories are recognised by their exact bit
//! pattern (see [`crate::constants`]); everything else is compared against the accumulator's
//! valid range.
//!
//! ## Non-sentinel edge cases
//!
//! - `NaN` is counted as [`PixelClass::Null`]: it carries no measurement.
//! - `-inf` is counted as [`PixelClass::LowRepresentationSaturation`].
//! - `+inf` is counted as [`PixelClass::HighRepresentationSaturation`].
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{HIGH_INSTR_SAT, HIGH_REPR_SAT, LOW_INSTR_SAT, LOW_REPR_SAT, NULL};

/// The five reserved special pixel categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialPixel {
    Null,
    LowInstrumentSaturation,
    LowRepresentationSaturation,
    HighInstrumentSaturation,
    HighRepresentationSaturation,
}

impl SpecialPixel {
    /// All categories, in report order.
    pub const ALL: [SpecialPixel; 5] = [
        SpecialPixel::Null,
        SpecialPixel::LowInstrumentSaturation,
        SpecialPixel::LowRepresentationSaturation,
        SpecialPixel::HighInstrumentSaturation,
        SpecialPixel::HighRepresentationSaturation,
    ];

    /// The sentinel value a solver should emit for this category.
    pub fn sentinel(self) -> f64 {
        match self {
            SpecialPixel::Null => NULL,
            SpecialPixel::LowInstrumentSaturation => LOW_INSTR_SAT,
            SpecialPixel::LowRepresentationSaturation => LOW_REPR_SAT,
            SpecialPixel::HighInstrumentSaturation => HIGH_INSTR_SAT,
            SpecialPixel::HighRepresentationSaturation => HIGH_REPR_SAT,
        }
    }

    /// Recognise a special value, or `None` for an ordinary number.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.is_nan() {
            return Some(SpecialPixel::Null);
        }
        if value == f64::NEG_INFINITY {
            return Some(SpecialPixel::LowRepresentationSaturation);
        }
        if value == f64::INFINITY {
            return Some(SpecialPixel::HighRepresentationSaturation);
        }
        match value.to_bits() {
            b if b == NULL.to_bits() => Some(SpecialPixel::Null),
            b if b == LOW_INSTR_SAT.to_bits() => Some(SpecialPixel::LowInstrumentSaturation),
            b if b == LOW_REPR_SAT.to_bits() => Some(SpecialPixel::LowRepresentationSaturation),
            b if b == HIGH_INSTR_SAT.to_bits() => Some(SpecialPixel::HighInstrumentSaturation),
            b if b == HIGH_REPR_SAT.to_bits() => Some(SpecialPixel::HighRepresentationSaturation),
            _ => None,
        }
    }

    /// Short label used in reports (`Null`, `Lis`, `Lrs`, `His`, `Hrs`).
    pub fn label(self) -> &'static str {
        match self {
            SpecialPixel::Null => "Null",
            SpecialPixel::LowInstrumentSaturation => "Lis",
            SpecialPixel::LowRepresentationSaturation => "Lrs",
            SpecialPixel::HighInstrumentSaturation => "His",
            SpecialPixel::HighRepresentationSaturation => "Hrs",
        }
    }
}

/// The bucket a single sample is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelClass {
    Valid,
    UnderRange,
    OverRange,
    Special(SpecialPixel),
}

impl PixelClass {
    /// Classify `value` against the inclusive range `[valid_minimum, valid_maximum]`.
    pub fn classify(value: f64, valid_minimum: f64, valid_maximum: f64) -> Self {
        if let Some(special) = SpecialPixel::from_value(value) {
            return PixelClass::Special(special);
        }
        if value < valid_minimum {
            PixelClass::UnderRange
        } else if value > valid_maximum {
            PixelClass::OverRange
        } else {
            PixelClass::Valid
        }
    }
}

impl fmt::Display for PixelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelClass::Valid => write!(f, "valid"),
            PixelClass::UnderRange => write!(f, "under-range"),
            PixelClass::OverRange => write!(f, "over-range"),
            PixelClass::Special(special) => write!(f, "{}", special.label()),
        }
    }
}

/// `true` when `value` is one of the reserved codes (or NaN / ±inf).
pub fn is_special(value: f64) -> bool {
    SpecialPixel::from_value(value).is_some()
}
