use thiserror::Error;

use crate::special_pixel::PixelClass;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Cannot remove {value} from the {bucket} bucket: it would go negative")]
    BucketUnderflow { bucket: PixelClass, value: f64 },

    #[error("Invalid valid range: [{min}, {max}]")]
    InvalidValidRange { min: f64, max: f64 },

    #[error("Cannot merge statistics with valid ranges [{0}, {1}] and [{2}, {3}]")]
    IncompatibleValidRange(f64, f64, f64, f64),

    #[error("Invalid rejection limit: {0}")]
    InvalidRejectionLimit(f64),

    #[error(
        "Inconsistent residual statistics lists: line={line}, sample={sample}, combined={combined}"
    )]
    InconsistentAggregate {
        line: usize,
        sample: usize,
        combined: usize,
    },

    #[error("Image index {index} out of range for {len} images")]
    ImageIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    #[error("Invalid dataset at {path}: {reason}")]
    DatasetFormat { path: String, reason: String },

    #[error("Incompatible dataset schema at {path}: expected version {expected}, found {found}")]
    SchemaVersionMismatch {
        path: String,
        expected: u32,
        found: String,
    },

    #[error("Invalid bundle settings: {0}")]
    SettingsError(String),

    #[error("Unable to read the system clock: {0}")]
    ClockError(String),
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::SettingsError(err.to_string())
    }
}

impl From<hifitime::HifitimeError> for BundleError {
    fn from(err: hifitime::HifitimeError) -> Self {
        BundleError::ClockError(err.to_string())
    }
}

impl PartialEq for BundleError {
    fn eq(&self, other: &Self) -> bool {
        use BundleError::*;
        match (self, other) {
            (
                BucketUnderflow {
                    bucket: a,
                    value: va,
                },
                BucketUnderflow {
                    bucket: b,
                    value: vb,
                },
            ) => a == b && va.to_bits() == vb.to_bits(),
            (InvalidValidRange { min: a, max: b }, InvalidValidRange { min: c, max: d }) => {
                a == c && b == d
            }
            (IncompatibleValidRange(a, b, c, d), IncompatibleValidRange(e, f, g, h)) => {
                a == e && b == f && c == g && d == h
            }
            (InvalidRejectionLimit(a), InvalidRejectionLimit(b)) => a.to_bits() == b.to_bits(),
            (
                InconsistentAggregate {
                    line: a,
                    sample: b,
                    combined: c,
                },
                InconsistentAggregate {
                    line: d,
                    sample: e,
                    combined: f,
                },
            ) => a == d && b == e && c == f,
            (
                ImageIndexOutOfRange { index: a, len: b },
                ImageIndexOutOfRange { index: c, len: d },
            ) => a == c && b == d,
            (InvalidRunId(a), InvalidRunId(b)) => a == b,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (ParquetError(_), ParquetError(_)) => true,
            (ArrowError(_), ArrowError(_)) => true,

            (
                DatasetFormat {
                    path: a,
                    reason: b,
                },
                DatasetFormat {
                    path: c,
                    reason: d,
                },
            ) => a == c && b == d,
            (
                SchemaVersionMismatch {
                    path: a,
                    expected: b,
                    found: c,
                },
                SchemaVersionMismatch {
                    path: d,
                    expected: e,
                    found: f,
                },
            ) => a == d && b == e && c == f,
            (SettingsError(a), SettingsError(b)) => a == b,
            (ClockError(a), ClockError(b)) => a == b,

            _ => false,
        }
    }
}
