use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

/// Fetches one archive to a local file. The production implementation talks
/// HTTP; tests install a fake that writes fixture bytes.
pub trait ArtifactDownloader {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), DownloadError>;
}

/// Blocking HTTP downloader. Progress is rendered by counting the bytes as
/// they flow through the copy, against the mandatory `Content-Length`.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("hover/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::Client)?;
        Ok(HttpDownloader { client })
    }
}

impl ArtifactDownloader for HttpDownloader {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let expected = response
            .content_length()
            .ok_or_else(|| DownloadError::MissingContentLength {
                url: url.to_string(),
            })?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = fs::File::create(destination).map_err(|source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        })?;

        let bar = ProgressBar::new(expected).with_style(progress_style());
        bar.set_message(archive_label(destination));
        let mut reader = bar.wrap_read(response);
        let written = io::copy(&mut reader, &mut file).map_err(|source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        bar.finish_and_clear();

        if written != expected {
            return Err(DownloadError::Truncated {
                url: url.to_string(),
                expected,
                actual: written,
            });
        }
        Ok(())
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} [{bar:40}] {bytes}/{total_bytes} ({percent}%)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn archive_label(destination: &Path) -> String {
    destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}

#[derive(Debug)]
pub enum DownloadError {
    Client(reqwest::Error),
    Request {
        url: String,
        source: reqwest::Error,
    },
    Status {
        url: String,
        status: u16,
    },
    MissingContentLength {
        url: String,
    },
    Truncated {
        url: String,
        expected: u64,
        actual: u64,
    },
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Client(error) => {
                write!(f, "failed to build download client: {}", error)
            }
            DownloadError::Request { url, source } => {
                write!(f, "failed to download '{}': {}", url, source)
            }
            DownloadError::Status { url, status } => {
                write!(f, "download of '{}' returned HTTP {}", url, status)
            }
            DownloadError::MissingContentLength { url } => {
                write!(f, "download of '{}' did not announce a Content-Length", url)
            }
            DownloadError::Truncated {
                url,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "download of '{}' was truncated: got {} of {} bytes",
                    url, actual, expected
                )
            }
            DownloadError::Io { path, source } => {
                write!(f, "failed to write '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DownloadError::Client(error) => Some(error),
            DownloadError::Request { source, .. } => Some(source),
            DownloadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
