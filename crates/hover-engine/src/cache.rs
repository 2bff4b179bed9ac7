use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use hover_core::target::TargetError;
use hover_core::version::OracleError;
use hover_core::{BuildMode, Context, Platform};

use crate::archive::{extract_zip, ArchiveError};
use crate::download::{ArtifactDownloader, DownloadError, HttpDownloader};
use crate::fsops::{self, FsError};
use crate::postprocess::{PostProcessError, SlotPostProcess, SystemPostProcess};
use crate::urls::{engine_source, EngineSource};

pub const VERSION_FILE: &str = "version";
pub const ICU_DATA_FILE: &str = "icudtl.dat";

const EMBEDDER_FRAMEWORK: &str = "FlutterEmbedder.framework";
const EMBEDDER_FRAMEWORK_ZIP: &str = "FlutterEmbedder.framework.zip";

/// All slots live under `<cacheRoot>/hover/engine`.
pub fn engine_cache_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("hover").join("engine")
}

/// One slot per (platform, mode) pair; the versionstamp inside the slot
/// distinguishes generations.
pub fn slot_dir(cache_root: &Path, platform: Platform, mode: BuildMode) -> PathBuf {
    engine_cache_dir(cache_root).join(format!("{}-{}", platform, mode.name()))
}

/// The sole freshness test for a slot: `<engineRevision>-<toolVersion>`,
/// single ASCII hyphen, no trailing newline.
pub fn versionstamp(revision: &str, tool_version: &str) -> String {
    format!("{}-{}", revision, tool_version)
}

/// Engine files the build stage needs from a slot, per (platform, mode).
pub fn engine_files(platform: Platform, mode: BuildMode) -> &'static [&'static str] {
    match (platform, mode.is_aot()) {
        (Platform::Linux, _) => &["libflutter_engine.so"],
        (Platform::Darwin, false) => &[EMBEDDER_FRAMEWORK],
        (Platform::Darwin, true) => &["libflutter_engine.dylib"],
        (Platform::Windows, false) => &["flutter_engine.dll"],
        (Platform::Windows, true) => &[
            "flutter_engine.dll",
            "flutter_engine.dll.exp",
            "flutter_engine.dll.lib",
            "flutter_engine.dll.pdb",
        ],
    }
}

/// Extra slot contents for AOT modes: the snapshotter, the code-generation
/// helper tree, and the patched Dart SDK.
const AOT_TOOL_FILES: &[&str] = &["dart", "gen_snapshot"];
const AOT_TOOL_DIRS: &[&str] = &["gen", "flutter_patched_sdk"];

pub struct EngineCache<'a> {
    context: &'a Context,
    downloader: Box<dyn ArtifactDownloader>,
    post_process: Box<dyn SlotPostProcess>,
    host: Platform,
}

impl<'a> EngineCache<'a> {
    pub fn new(context: &'a Context) -> Result<Self, CacheError> {
        let downloader = HttpDownloader::new().map_err(CacheError::Download)?;
        Ok(Self::with_parts(
            context,
            Box::new(downloader),
            Box::new(SystemPostProcess),
            Platform::host().map_err(CacheError::Target)?,
        ))
    }

    pub fn with_parts(
        context: &'a Context,
        downloader: Box<dyn ArtifactDownloader>,
        post_process: Box<dyn SlotPostProcess>,
        host: Platform,
    ) -> Self {
        EngineCache {
            context,
            downloader,
            post_process,
            host,
        }
    }

    /// Makes the slot for (platform, mode) hold the engine artifacts for the
    /// effective revision and returns its path. A slot whose `version`
    /// marker matches is returned untouched; anything else is rebuilt from
    /// scratch through a staging directory, with the marker written last.
    pub fn ensure(
        &self,
        platform: Platform,
        mode: BuildMode,
        revision_override: Option<&str>,
    ) -> Result<PathBuf, CacheError> {
        let slot = slot_dir(self.context.cache_root(), platform, mode);
        if slot.to_string_lossy().contains(' ') {
            return Err(CacheError::SpaceInCachePath { path: slot });
        }
        if platform == Platform::Darwin && mode.is_aot() && self.host != Platform::Darwin {
            return Err(CacheError::DarwinAotCrossBuild);
        }

        let revision = match revision_override {
            Some(revision) => revision.to_string(),
            None => self
                .context
                .oracle()
                .engine_revision()
                .map_err(CacheError::Oracle)?,
        };
        let stamp = versionstamp(&revision, self.context.tool_version());

        match fs::read_to_string(slot.join(VERSION_FILE)) {
            Ok(existing) if existing == stamp => return Ok(slot),
            Ok(_) => {
                // Never update a slot in place: a partially overwritten mix
                // of generations must be impossible.
                fs::remove_dir_all(&slot).map_err(|source| CacheError::Io {
                    path: slot.clone(),
                    source,
                })?;
            }
            Err(_) => {}
        }

        self.refresh(platform, mode, &revision, &stamp, &slot)?;
        Ok(slot)
    }

    fn refresh(
        &self,
        platform: Platform,
        mode: BuildMode,
        revision: &str,
        stamp: &str,
        slot: &Path,
    ) -> Result<(), CacheError> {
        tracing::info!(%platform, %mode, revision, "refreshing engine cache slot");
        let engine_root = engine_cache_dir(self.context.cache_root());
        fs::create_dir_all(&engine_root).map_err(|source| CacheError::Io {
            path: engine_root.clone(),
            source,
        })?;
        let _lock = RefreshLock::acquire(
            engine_root.join(format!("{}-{}.lock", platform, mode.name())),
        );

        let staging = tempfile::tempdir().map_err(|source| CacheError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let downloads = staging.path().join("download");
        let unpacked = staging.path().join("engine");

        match engine_source(platform, mode, revision) {
            EngineSource::Debug {
                embedder_url,
                artifacts_url,
            } => {
                let embedder = downloads.join("embedder.zip");
                self.downloader
                    .fetch(&embedder_url, &embedder)
                    .map_err(CacheError::Download)?;
                let artifacts = downloads.join("artifacts.zip");
                self.downloader
                    .fetch(&artifacts_url, &artifacts)
                    .map_err(CacheError::Download)?;
                extract_zip(&embedder, &unpacked).map_err(CacheError::Archive)?;
                extract_zip(&artifacts, &unpacked).map_err(CacheError::Archive)?;
            }
            EngineSource::Aot { archive_url } => {
                let combined = downloads.join("engine.zip");
                self.downloader
                    .fetch(&archive_url, &combined)
                    .map_err(|source| CacheError::AotDownload {
                        revision: revision.to_string(),
                        source,
                    })?;
                extract_zip(&combined, &unpacked).map_err(CacheError::Archive)?;
            }
        }

        if platform == Platform::Darwin && !mode.is_aot() {
            expand_embedder_framework(&unpacked)?;
        }

        fs::create_dir_all(slot).map_err(|source| CacheError::Io {
            path: slot.to_path_buf(),
            source,
        })?;
        for name in engine_files(platform, mode) {
            let source = unpacked.join(name);
            let destination = slot.join(name);
            if source.is_dir() {
                fsops::copy_tree(&source, &destination).map_err(CacheError::Copy)?;
            } else if source.is_file() {
                fsops::copy_file(&source, &destination).map_err(CacheError::Copy)?;
            } else {
                return Err(CacheError::MissingArtifact { path: source });
            }
        }

        match platform {
            Platform::Linux => self
                .post_process
                .strip_library(&slot.join("libflutter_engine.so"))
                .map_err(CacheError::PostProcess)?,
            Platform::Darwin if mode.is_aot() => self
                .post_process
                .rewrite_install_name(&slot.join("libflutter_engine.dylib"))
                .map_err(CacheError::PostProcess)?,
            _ => {}
        }

        let icu = unpacked.join(ICU_DATA_FILE);
        if !icu.is_file() {
            return Err(CacheError::MissingArtifact { path: icu });
        }
        fsops::copy_file(&icu, &slot.join(ICU_DATA_FILE)).map_err(CacheError::Copy)?;

        if mode.is_aot() {
            for name in AOT_TOOL_FILES {
                let name = format!("{}{}", name, platform.exe_suffix());
                let source = unpacked.join(&name);
                if !source.is_file() {
                    return Err(CacheError::MissingArtifact { path: source });
                }
                fsops::copy_file(&source, &slot.join(&name)).map_err(CacheError::Copy)?;
            }
            for name in AOT_TOOL_DIRS {
                let source = unpacked.join(name);
                if !source.is_dir() {
                    return Err(CacheError::MissingArtifact { path: source });
                }
                fsops::copy_tree(&source, &slot.join(name)).map_err(CacheError::Copy)?;
            }
        }

        // Commit point: a slot is only trusted once its marker exists, so
        // every failure above leaves a slot the next run treats as stale.
        write_version_marker(slot, stamp)
    }
}

/// Removes every cached engine slot.
pub fn clean(cache_root: &Path) -> Result<(), CacheError> {
    let engine_root = engine_cache_dir(cache_root);
    if !engine_root.exists() {
        return Ok(());
    }
    fs::remove_dir_all(&engine_root).map_err(|source| CacheError::Io {
        path: engine_root,
        source,
    })
}

/// Expands the nested embedder framework archive and recreates the symbolic
/// links of the macOS framework convention.
fn expand_embedder_framework(unpacked: &Path) -> Result<(), CacheError> {
    let nested = unpacked.join(EMBEDDER_FRAMEWORK_ZIP);
    if !nested.is_file() {
        return Ok(());
    }
    let framework = unpacked.join(EMBEDDER_FRAMEWORK);
    extract_zip(&nested, &framework).map_err(CacheError::Archive)?;
    fs::remove_file(&nested).map_err(|source| CacheError::Io {
        path: nested,
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::symlink;

        let links: &[(&str, PathBuf)] = &[
            ("A", framework.join("Versions").join("Current")),
            (
                "Versions/Current/FlutterEmbedder",
                framework.join("FlutterEmbedder"),
            ),
            ("Versions/Current/Headers", framework.join("Headers")),
            ("Versions/Current/Modules", framework.join("Modules")),
            ("Versions/Current/Resources", framework.join("Resources")),
        ];
        for (target, location) in links {
            if location.symlink_metadata().is_ok() {
                fs::remove_file(location).map_err(|source| CacheError::Io {
                    path: location.clone(),
                    source,
                })?;
            }
            symlink(target, location).map_err(|source| CacheError::Io {
                path: location.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

fn write_version_marker(slot: &Path, stamp: &str) -> Result<(), CacheError> {
    let marker = slot.join(VERSION_FILE);
    fs::write(&marker, stamp.as_bytes()).map_err(|source| CacheError::Io {
        path: marker.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&marker, fs::Permissions::from_mode(0o664)).map_err(|source| {
            CacheError::Io {
                path: marker.clone(),
                source,
            }
        })?;
    }
    Ok(())
}

/// Best-effort advisory lock against concurrent refreshes of one slot from
/// separate invocations. Held for the duration of a refresh.
struct RefreshLock {
    path: PathBuf,
}

impl RefreshLock {
    fn acquire(path: PathBuf) -> Self {
        if let Err(error) = fs::write(&path, b"") {
            tracing::debug!(path = %path.display(), %error, "could not create refresh lockfile");
        }
        RefreshLock { path }
    }
}

impl Drop for RefreshLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
pub enum CacheError {
    Oracle(OracleError),
    Target(TargetError),
    SpaceInCachePath {
        path: PathBuf,
    },
    DarwinAotCrossBuild,
    Download(DownloadError),
    AotDownload {
        revision: String,
        source: DownloadError,
    },
    Archive(ArchiveError),
    Copy(FsError),
    PostProcess(PostProcessError),
    MissingArtifact {
        path: PathBuf,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Oracle(error) => write!(f, "{}", error),
            CacheError::Target(error) => write!(f, "{}", error),
            CacheError::SpaceInCachePath { path } => {
                write!(
                    f,
                    "engine cache path '{}' contains a space, which the host compiler's linker flags cannot tolerate; choose another location with --cache-path",
                    path.display()
                )
            }
            CacheError::DarwinAotCrossBuild => {
                write!(
                    f,
                    "profile and release engine artifacts for darwin are only available on a macOS host"
                )
            }
            CacheError::Download(error) => write!(f, "{}", error),
            CacheError::AotDownload { revision, source } => {
                write!(
                    f,
                    "{}; AOT engine builds for revision '{}' may not be published yet",
                    source, revision
                )
            }
            CacheError::Archive(error) => write!(f, "{}", error),
            CacheError::Copy(error) => write!(f, "{}", error),
            CacheError::PostProcess(error) => write!(f, "{}", error),
            CacheError::MissingArtifact { path } => {
                write!(
                    f,
                    "downloaded engine archive is missing '{}'",
                    path.display()
                )
            }
            CacheError::Io { path, source } => {
                write!(f, "cache i/o failed at '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Oracle(error) => Some(error),
            CacheError::Target(error) => Some(error),
            CacheError::Download(error) => Some(error),
            CacheError::AotDownload { source, .. } => Some(source),
            CacheError::Archive(error) => Some(error),
            CacheError::Copy(error) => Some(error),
            CacheError::PostProcess(error) => Some(error),
            CacheError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
