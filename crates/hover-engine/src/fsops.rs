use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Copies a single file, creating the destination's parent directories.
/// Permissions travel with the copy.
pub fn copy_file(source: &Path, destination: &Path) -> Result<(), FsError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| FsError::new(parent, err))?;
    }
    fs::copy(source, destination).map_err(|err| FsError::new(source, err))?;
    Ok(())
}

/// Recursively copies a directory tree without following symbolic links;
/// links are recreated pointing at their original (usually relative) target.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<(), FsError> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| FsError {
            path: source.to_path_buf(),
            message: err.to_string(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|err| FsError {
                path: entry.path().to_path_buf(),
                message: err.to_string(),
            })?;
        let target = destination.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|err| FsError::new(&target, err))?;
        } else if file_type.is_symlink() {
            replicate_symlink(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
pub fn replicate_symlink(source: &Path, destination: &Path) -> Result<(), FsError> {
    let link_target = fs::read_link(source).map_err(|err| FsError::new(source, err))?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| FsError::new(parent, err))?;
    }
    if destination.symlink_metadata().is_ok() {
        fs::remove_file(destination).map_err(|err| FsError::new(destination, err))?;
    }
    std::os::unix::fs::symlink(&link_target, destination)
        .map_err(|err| FsError::new(destination, err))?;
    Ok(())
}

// Symlinked engine trees only occur inside macOS frameworks; on other
// families the link is materialized as a plain copy.
#[cfg(not(unix))]
pub fn replicate_symlink(source: &Path, destination: &Path) -> Result<(), FsError> {
    let resolved = fs::canonicalize(source).map_err(|err| FsError::new(source, err))?;
    copy_file(&resolved, destination)
}

#[derive(Debug)]
pub struct FsError {
    pub path: PathBuf,
    pub message: String,
}

impl FsError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        FsError {
            path: path.to_path_buf(),
            message: source.to_string(),
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file operation failed at '{}': {}",
            self.path.display(),
            self.message
        )
    }
}

impl std::error::Error for FsError {}
