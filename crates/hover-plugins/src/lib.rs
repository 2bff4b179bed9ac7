use std::fmt;
use std::path::PathBuf;

pub mod allowlist;
pub mod imports;
pub mod resolver;

pub use allowlist::{fetch_standalone_list, StandaloneImplementation};
pub use imports::{GoModuleOps, ModuleOps, PluginImporter};
pub use resolver::{discover_plugins, ImportSource, PluginEntry, PluginSource};

#[derive(Debug)]
pub enum PluginError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Download(hover_engine::DownloadError),
    MissingPubCache,
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::Io { path, source } => {
                write!(f, "plugin i/o failed at '{}': {}", path.display(), source)
            }
            PluginError::Download(error) => write!(f, "{}", error),
            PluginError::MissingPubCache => {
                write!(f, "could not locate the Dart package cache; set PUB_CACHE")
            }
        }
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PluginError::Io { source, .. } => Some(source),
            PluginError::Download(error) => Some(error),
            PluginError::MissingPubCache => None,
        }
    }
}
