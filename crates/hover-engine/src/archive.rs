use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extracts a zip archive into `staging`, refusing any entry whose
/// normalized destination would land outside the staging root.
pub fn extract_zip(archive: &Path, staging: &Path) -> Result<(), ArchiveError> {
    let file = fs::File::open(archive).map_err(|source| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Read {
        path: archive.to_path_buf(),
        source,
    })?;
    fs::create_dir_all(staging).map_err(|source| ArchiveError::Io {
        path: staging.to_path_buf(),
        source,
    })?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|source| ArchiveError::Read {
            path: archive.to_path_buf(),
            source,
        })?;
        let name = entry.name().to_string();
        let destination = match entry.enclosed_name() {
            Some(relative) => staging.join(relative),
            None => return Err(ArchiveError::ZipSlip { entry: name }),
        };
        if !destination.starts_with(staging) {
            return Err(ArchiveError::ZipSlip { entry: name });
        }
        if entry.is_dir() {
            fs::create_dir_all(&destination).map_err(|source| ArchiveError::Io {
                path: destination.clone(),
                source,
            })?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut output = fs::File::create(&destination).map_err(|source| ArchiveError::Io {
            path: destination.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut output).map_err(|source| ArchiveError::Io {
            path: destination.clone(),
            source,
        })?;
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&destination, fs::Permissions::from_mode(mode)).map_err(
                |source| ArchiveError::Io {
                    path: destination.clone(),
                    source,
                },
            )?;
        }
    }
    Ok(())
}

#[derive(Debug)]
pub enum ArchiveError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    ZipSlip {
        entry: String,
    },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Io { path, source } => {
                write!(f, "archive i/o failed at '{}': {}", path.display(), source)
            }
            ArchiveError::Read { path, source } => {
                write!(f, "failed to read archive '{}': {}", path.display(), source)
            }
            ArchiveError::ZipSlip { entry } => {
                write!(
                    f,
                    "archive entry '{}' escapes the extraction directory",
                    entry
                )
            }
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io { source, .. } => Some(source),
            ArchiveError::Read { source, .. } => Some(source),
            ArchiveError::ZipSlip { .. } => None,
        }
    }
}
