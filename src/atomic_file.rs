//! All-or-nothing file output.
//!
//! Exports are written to a hidden temporary file next to the target and renamed over it
//! once complete, so a reader never observes a half-written report or dataset. On failure
//! the temporary file is removed and the target is left as it was.
use std::fs::{self, File};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use crate::bundle_errors::BundleError;

fn temporary_path(path: &Utf8Path) -> Result<Utf8PathBuf, BundleError> {
    let file_name = path.file_name().ok_or_else(|| {
        BundleError::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{path}' does not name a file"),
        ))
    })?;
    let suffix: u32 = rand::random();
    Ok(path.with_file_name(format!(".{file_name}.{suffix:08x}.tmp")))
}

/// Write `path` through `write`, atomically from the caller's point of view.
///
/// Arguments
/// -----------------
/// * `path` – Final destination; overwritten if it exists.
/// * `write` – Produces the full file content into the temporary file.
///
/// Return
/// ----------
/// * `Err(BundleError::IoError)` if the temporary file cannot be created (e.g. the parent
///   directory is missing or read-only), synced or renamed; any error returned by `write`.
pub(crate) fn write_atomically<F>(path: &Utf8Path, write: F) -> Result<(), BundleError>
where
    F: FnOnce(&mut File) -> Result<(), BundleError>,
{
    let tmp = temporary_path(path)?;
    let mut file = File::create(&tmp)?;

    let outcome = write(&mut file)
        .and_then(|_| file.sync_all().map_err(BundleError::from))
        .and_then(|_| {
            drop(file);
            fs::rename(&tmp, path).map_err(BundleError::from)
        });

    if outcome.is_err() {
        // best effort: the original error is what matters
        let _ = fs::remove_file(&tmp);
    } else {
        debug!("wrote {path} through {tmp}");
    }
    outcome
}
