use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use szuru_core::DryRun;

/// Preserves `source` inside `failsafe_dir` so a failed upload cannot lose
/// data. Hard-links when possible and falls back to a byte copy when the
/// link cannot be created (cross-device, unsupported filesystem, existing
/// destination). The source file is never touched: if the destination is
/// already a link to the source, the call is a no-op, and the copy fallback
/// goes through a temporary name so a destination sharing the source's
/// inode is never truncated.
pub fn preserve(source: &Path, failsafe_dir: &Path, dry_run: DryRun) -> io::Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name")
    })?;
    let destination = failsafe_dir.join(file_name);
    if dry_run.is_active() {
        return Ok(destination);
    }
    fs::create_dir_all(failsafe_dir)?;
    if let Err(err) = fs::hard_link(source, &destination) {
        if err.kind() == io::ErrorKind::AlreadyExists && is_same_file(source, &destination)? {
            return Ok(destination);
        }
        tracing::warn!(
            source = %source.display(),
            error = %err,
            "hard link into failsafe directory failed, copying instead"
        );
        stage_copy(source, &destination)?;
    }
    Ok(destination)
}

/// Copies through a sibling partial file and renames it into place, so an
/// existing destination is replaced rather than opened for truncation.
fn stage_copy(source: &Path, destination: &Path) -> io::Result<()> {
    let partial = partial_path(destination);
    fs::copy(source, &partial)?;
    fs::rename(&partial, destination)?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

#[cfg(unix)]
fn is_same_file(source: &Path, destination: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let source_meta = fs::metadata(source)?;
    let Ok(destination_meta) = fs::metadata(destination) else {
        return Ok(false);
    };
    Ok(source_meta.dev() == destination_meta.dev() && source_meta.ino() == destination_meta.ino())
}

#[cfg(not(unix))]
fn is_same_file(_source: &Path, _destination: &Path) -> io::Result<bool> {
    Ok(false)
}
