//! Mapping request names onto files under the media root.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::Error;

/// A regular file under the root, as seen when the request was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical path, always inside the resolver's root.
    pub path: PathBuf,
    /// Final path component, used for `Content-Disposition` and media type.
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
}

impl FileResolver {
    /// Create `root` if it does not exist and resolve names against its
    /// canonical form.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;
        Ok(FileResolver { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the regular file called `requested` under the root.
    ///
    /// `requested` may name a file in a subdirectory (`shows/ep1.mkv`) but
    /// may not climb out of the root, start at the filesystem root, or
    /// point at hidden entries.
    pub async fn resolve(&self, requested: &str) -> Result<ResolvedFile, Error> {
        let relative = relative_path(requested)?;

        let path = match tokio::fs::canonicalize(self.root.join(&relative)).await {
            Ok(path) => path,
            Err(e) => {
                debug!(name = requested, error = %e, "cannot canonicalize requested file");
                return Err(Error::NotFound(requested.to_string()));
            }
        };

        // symlinks may still lead outside
        if !path.starts_with(&self.root) {
            warn!(name = requested, resolved = %path.display(), "requested file escapes media root");
            return Err(Error::InvalidName(requested.to_string()));
        }

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(requested.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        if !metadata.is_file() {
            return Err(Error::NotFound(requested.to_string()));
        }

        let name = relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| requested.to_string());

        Ok(ResolvedFile {
            path,
            name,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Validate a requested name and turn it into a relative path.
///
/// Both `/` and `\` separate components. Empty and `.` components are
/// dropped.
fn relative_path(requested: &str) -> Result<PathBuf, Error> {
    let invalid = || Error::InvalidName(requested.to_string());

    if requested.starts_with('/') || requested.starts_with('\\') || requested.contains('\0') {
        return Err(invalid());
    }

    let mut relative = PathBuf::new();
    for segment in requested.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid()),
            hidden if hidden.starts_with('.') => {
                return Err(Error::NotFound(requested.to_string()));
            }
            _ => {}
        }

        // rejects drive prefixes and anything else that is not a plain name
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => relative.push(segment),
            _ => return Err(invalid()),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(invalid());
    }

    Ok(relative)
}
