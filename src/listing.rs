use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One servable file, as reported by `GET /api/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "lastModified")]
    pub last_modified: DateTime<Utc>,
}

/// Enumerate the regular, non-hidden files under `root`, sorted
/// case-insensitively by name.
///
/// Without `recursive` only the immediate children of `root` are listed.
/// With it, files in subdirectories are listed under their `/`-separated
/// path relative to `root`, and hidden directories are not entered.
///
/// A symlink is listed under its own name when it points at a regular file
/// inside `root`, the same files the resolver will serve. Symlinked
/// directories are never entered.
///
/// This does blocking filesystem calls; run it off the async executor.
pub fn list_files(root: &Path, recursive: bool) -> io::Result<Vec<FileEntry>> {
    let canonical_root = root.canonicalize()?;
    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        let metadata = if entry.path_is_symlink() {
            match link_target(&canonical_root, entry.path()) {
                Some(metadata) => metadata,
                None => continue,
            }
        } else if entry.file_type().is_file() {
            entry.metadata()?
        } else {
            continue;
        };

        let Some(name) = relative_name(root, entry.path()) else {
            debug!(path = %entry.path().display(), "skipping file with non UTF-8 name");
            continue;
        };

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();

        files.push(FileEntry {
            name,
            size_bytes: metadata.len(),
            last_modified,
        });
    }

    files.sort_by_cached_key(|file| file.name.to_lowercase());
    Ok(files)
}

// the root itself is never hidden, whatever its name
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

// metadata of the regular file a symlink leads to, if it stays inside the root
fn link_target(canonical_root: &Path, link: &Path) -> Option<Metadata> {
    let target = fs::canonicalize(link).ok()?;
    if !target.starts_with(canonical_root) {
        debug!(link = %link.display(), target = %target.display(), "skipping symlink leaving the root");
        return None;
    }
    let metadata = fs::metadata(&target).ok()?;
    metadata.is_file().then_some(metadata)
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
