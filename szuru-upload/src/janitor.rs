use std::fs;
use std::path::Path;

use szuru_core::DryRun;
use walkdir::WalkDir;

const JUNK_FILES: [&str; 2] = ["Thumbs.db", ".DS_Store"];
const JUNK_DIRS: [&str; 1] = ["@eaDir"];

/// Sweeps `root` bottom-up after an upload pass: known junk artifacts are
/// deleted, emptied directories are removed, and `root` itself is always
/// left in place. A removal failure for an ordinary directory means it
/// still has content and is tolerated silently.
pub fn sweep(root: &Path, dry_run: DryRun) {
    if dry_run.is_active() || !root.is_dir() {
        return;
    }
    for entry in WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if entry.depth() == 0 {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() {
            if JUNK_FILES.iter().any(|junk| name == *junk) {
                if let Err(err) = fs::remove_file(entry.path()) {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %err,
                        "failed to remove junk file"
                    );
                }
            }
        } else if entry.file_type().is_dir() {
            if JUNK_DIRS.iter().any(|junk| name == *junk) {
                if let Err(err) = fs::remove_dir_all(entry.path()) {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %err,
                        "failed to remove junk directory"
                    );
                }
            } else {
                let _ = fs::remove_dir(entry.path());
            }
        }
    }
}
