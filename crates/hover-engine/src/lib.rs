pub mod archive;
pub mod cache;
pub mod download;
pub mod fsops;
pub mod postprocess;
pub mod urls;

pub use cache::{clean, engine_files, slot_dir, versionstamp, CacheError, EngineCache};
pub use download::{ArtifactDownloader, DownloadError, HttpDownloader};
pub use postprocess::{PostProcessError, SlotPostProcess, SystemPostProcess};
