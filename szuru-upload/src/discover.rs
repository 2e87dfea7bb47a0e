use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const ALLOWED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "mp4", "webm", "gif", "swf"];

pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Lazily yields media files under `root`, recursing into subdirectories.
/// A root that is itself a media file yields exactly that file.
pub fn media_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_media_file(path))
}
