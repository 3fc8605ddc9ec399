//! Write-to-temporary-then-rename commits.

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::dng_pipeline::common::error::{ConversionError, Result};

/// Runs `write` against a temporary file next to `destination` and renames
/// it into place once everything has been flushed and synced.
///
/// If `write` fails, or any later step does, the temporary file is removed
/// and whatever was at `destination` before is left untouched.
pub fn commit_atomically<F>(destination: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".raw2dng-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| {
            ConversionError::OutputWriteError(format!(
                "Failed to create temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;
    debug!("Staging output in {}", temp.path().display());

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|e| ConversionError::OutputWriteError(format!("Failed to flush output: {}", e)))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| ConversionError::OutputWriteError(format!("Failed to sync output: {}", e)))?;

    temp.persist(destination).map_err(|e| {
        ConversionError::OutputWriteError(format!(
            "Failed to move output into place at {}: {}",
            destination.display(),
            e.error
        ))
    })?;
    debug!("Committed {}", destination.display());
    Ok(())
}
