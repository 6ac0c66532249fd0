//! Atomic write-out of an [`EmitResult`].
//!
//! Files are staged in a hidden directory next to the output directory, so a
//! failing target never leaves half-written files behind. A missing output
//! directory is created by renaming the staging directory into place. In an
//! existing one every staged file is swapped in over its counterpart, whose old
//! contents are kept aside until all swaps succeeded; any failure puts them
//! back. Unrelated files are left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::EmitResult;
use crate::error::TargetError;

const STAGING_PREFIX: &str = ".athalar-";

/// Write every file of `result` below `out_dir`. Returns the number of files.
pub fn write_atomic(out_dir: &Path, result: &EmitResult) -> Result<usize, TargetError> {
    let parent = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(failure(&parent))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)
        .map_err(failure(&parent))?;

    for (relative, content) in &result.files {
        let path = staging.path().join(relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(failure(dir))?;
        }
        fs::write(&path, content).map_err(failure(&path))?;
    }

    if !out_dir.exists() {
        match fs::rename(staging.path(), out_dir) {
            Ok(()) => {
                debug!(dir = %out_dir.display(), "moved staging directory into place");
                return Ok(result.len());
            }
            // Someone created the directory in the meantime; merge file by file.
            Err(_) if out_dir.is_dir() => {}
            Err(e) => return Err(failure(out_dir)(e)),
        }
    }

    let backup = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)
        .map_err(failure(&parent))?;

    let mut swapped = Vec::with_capacity(result.len());
    for relative in result.files.keys() {
        let target = out_dir.join(relative);
        let staged = staging.path().join(relative);
        match swap_in(&staged, &target, &backup.path().join(relative)) {
            Ok(saved) => swapped.push((target, saved)),
            Err(e) => {
                roll_back(swapped);
                return Err(e);
            }
        }
    }
    debug!(dir = %out_dir.display(), files = result.len(), "replaced files in place");
    Ok(result.len())
}

/// Move `target` aside to `saved` (if it exists) and `staged` into its place.
/// Returns where the old file went. On failure nothing has changed.
fn swap_in(staged: &Path, target: &Path, saved: &Path) -> Result<Option<PathBuf>, TargetError> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).map_err(failure(dir))?;
    }

    let old = match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => {
            return Err(failure(target)(io::Error::new(
                io::ErrorKind::IsADirectory,
                "a directory is in the way",
            )));
        }
        Ok(_) => {
            if let Some(dir) = saved.parent() {
                fs::create_dir_all(dir).map_err(failure(dir))?;
            }
            fs::rename(target, saved).map_err(failure(target))?;
            Some(saved.to_path_buf())
        }
        Err(_) => None,
    };

    if let Err(e) = fs::rename(staged, target) {
        if let Some(old) = &old {
            restore(old, target);
        }
        return Err(failure(target)(e));
    }
    Ok(old)
}

/// Undo completed swaps, newest first.
fn roll_back(swapped: Vec<(PathBuf, Option<PathBuf>)>) {
    for (target, saved) in swapped.into_iter().rev() {
        match saved {
            Some(old) => restore(&old, &target),
            None => {
                if let Err(e) = fs::remove_file(&target) {
                    warn!(file = %target.display(), error = %e, "could not remove new file");
                }
            }
        }
    }
}

fn restore(old: &Path, target: &Path) {
    if let Err(e) = fs::rename(old, target) {
        warn!(file = %target.display(), error = %e, "could not restore previous file");
    }
}

fn failure(path: &Path) -> impl FnOnce(io::Error) -> TargetError + '_ {
    move |source| TargetError::WriteFailure {
        path: path.to_path_buf(),
        source,
    }
}
