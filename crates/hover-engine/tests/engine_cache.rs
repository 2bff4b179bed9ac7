use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hover_core::tools::ToolLocator;
use hover_core::version::StaticVersionOracle;
use hover_core::{BuildMode, Context, Platform};
use hover_engine::cache::{slot_dir, EngineCache, VERSION_FILE};
use hover_engine::download::{ArtifactDownloader, DownloadError};
use hover_engine::postprocess::{PostProcessError, SlotPostProcess};
use hover_engine::CacheError;

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(contents).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

struct FakeDownloader {
    archives: HashMap<&'static str, Vec<u8>>,
    fetched: Rc<RefCell<Vec<String>>>,
}

impl FakeDownloader {
    fn new(archives: HashMap<&'static str, Vec<u8>>) -> (Self, Rc<RefCell<Vec<String>>>) {
        let fetched = Rc::new(RefCell::new(Vec::new()));
        (
            FakeDownloader {
                archives,
                fetched: Rc::clone(&fetched),
            },
            fetched,
        )
    }

    fn empty() -> (Self, Rc<RefCell<Vec<String>>>) {
        Self::new(HashMap::new())
    }
}

impl ArtifactDownloader for FakeDownloader {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), DownloadError> {
        self.fetched.borrow_mut().push(url.to_string());
        for (suffix, bytes) in &self.archives {
            if url.ends_with(suffix) {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).expect("create download dir");
                }
                fs::write(destination, bytes).expect("write fixture archive");
                return Ok(());
            }
        }
        Err(DownloadError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[derive(Default)]
struct Recorded {
    stripped: Vec<PathBuf>,
    rewritten: Vec<PathBuf>,
}

struct RecordingPostProcess {
    calls: Rc<RefCell<Recorded>>,
}

impl RecordingPostProcess {
    fn new() -> (Self, Rc<RefCell<Recorded>>) {
        let calls = Rc::new(RefCell::new(Recorded::default()));
        (
            RecordingPostProcess {
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl SlotPostProcess for RecordingPostProcess {
    fn strip_library(&self, library: &Path) -> Result<(), PostProcessError> {
        self.calls.borrow_mut().stripped.push(library.to_path_buf());
        Ok(())
    }

    fn rewrite_install_name(&self, library: &Path) -> Result<(), PostProcessError> {
        self.calls.borrow_mut().rewritten.push(library.to_path_buf());
        Ok(())
    }
}

fn test_context(root: &Path, tool_version: &str) -> Context {
    Context::with_parts(
        root.join("project"),
        root.join("cache"),
        tool_version.to_string(),
        Rc::new(ToolLocator::new()),
        Box::new(StaticVersionOracle {
            engine_revision: "oracle-revision".to_string(),
            channel: "stable".to_string(),
        }),
    )
}

fn linux_debug_archives() -> HashMap<&'static str, Vec<u8>> {
    let mut archives = HashMap::new();
    archives.insert(
        "linux-x64-embedder",
        zip_bytes(&[("libflutter_engine.so", b"engine-library".as_ref())]),
    );
    archives.insert(
        "artifacts.zip",
        zip_bytes(&[("icudtl.dat", b"icu-data".as_ref())]),
    );
    archives
}

#[test]
fn fresh_linux_debug_refresh_populates_slot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1.2.3");
    let (downloader, fetched) = FakeDownloader::new(linux_debug_archives());
    let (post_process, calls) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let slot = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abcdef0123"))
        .expect("ensure");

    assert_eq!(
        *fetched.borrow(),
        vec![
            "https://storage.googleapis.com/flutter_infra/flutter/abcdef0123/linux-x64/linux-x64-embedder"
                .to_string(),
            "https://storage.googleapis.com/flutter_infra/flutter/abcdef0123/linux-x64/artifacts.zip"
                .to_string(),
        ]
    );
    assert_eq!(
        fs::read(slot.join("libflutter_engine.so")).expect("engine copied"),
        b"engine-library".to_vec()
    );
    assert_eq!(
        fs::read(slot.join("icudtl.dat")).expect("icu copied"),
        b"icu-data".to_vec()
    );
    assert_eq!(
        fs::read_to_string(slot.join(VERSION_FILE)).expect("marker"),
        "abcdef0123-v1.2.3"
    );
    assert_eq!(
        calls.borrow().stripped,
        vec![slot.join("libflutter_engine.so")]
    );
    assert!(calls.borrow().rewritten.is_empty());
}

#[cfg(unix)]
#[test]
fn version_marker_mode_is_group_writable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1.2.3");
    let (downloader, _) = FakeDownloader::new(linux_debug_archives());
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );
    let slot = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect("ensure");
    let mode = fs::metadata(slot.join(VERSION_FILE))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o664);
}

#[test]
fn matching_slot_is_a_cache_hit_with_no_downloads() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1");
    let slot = slot_dir(context.cache_root(), Platform::Linux, BuildMode::Debug);
    fs::create_dir_all(&slot).expect("create slot");
    fs::write(slot.join(VERSION_FILE), "abc-v1").expect("write marker");
    fs::write(slot.join("libflutter_engine.so"), b"").expect("write lib");

    let (downloader, fetched) = FakeDownloader::empty();
    let (post_process, calls) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let returned = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect("ensure");

    assert_eq!(returned, slot);
    assert!(fetched.borrow().is_empty());
    assert!(calls.borrow().stripped.is_empty());
    assert_eq!(
        fs::read_to_string(slot.join(VERSION_FILE)).expect("marker"),
        "abc-v1"
    );
    assert_eq!(fs::read(slot.join("libflutter_engine.so")).expect("lib"), b"");
}

#[test]
fn second_ensure_performs_no_downloads() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1.2.3");
    let (downloader, fetched) = FakeDownloader::new(linux_debug_archives());
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect("first ensure");
    let after_first = fetched.borrow().len();
    cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect("second ensure");
    assert_eq!(fetched.borrow().len(), after_first);
}

#[test]
fn stale_slot_is_removed_before_refresh() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1");
    let slot = slot_dir(context.cache_root(), Platform::Linux, BuildMode::Debug);
    fs::create_dir_all(&slot).expect("create slot");
    fs::write(slot.join(VERSION_FILE), "old-v1").expect("write marker");
    fs::write(slot.join("leftover.txt"), b"previous generation").expect("write leftover");

    let (downloader, _) = FakeDownloader::new(linux_debug_archives());
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("new"))
        .expect("ensure");

    assert_eq!(
        fs::read_to_string(slot.join(VERSION_FILE)).expect("marker"),
        "new-v1"
    );
    assert!(!slot.join("leftover.txt").exists());
}

#[test]
fn traversal_entry_in_engine_archive_is_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1");
    let mut archives = HashMap::new();
    archives.insert(
        "linux-x64-embedder",
        zip_bytes(&[("../../evil.txt", b"boom".as_ref())]),
    );
    archives.insert("artifacts.zip", zip_bytes(&[("icudtl.dat", b"icu".as_ref())]));

    let (downloader, _) = FakeDownloader::new(archives);
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let error = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect_err("zip-slip must be fatal");
    assert!(error.to_string().contains("../../evil.txt"));

    // No marker: the next run must treat the slot as stale.
    let slot = slot_dir(context.cache_root(), Platform::Linux, BuildMode::Debug);
    assert!(!slot.join(VERSION_FILE).exists());
}

#[test]
fn darwin_release_rewrites_install_name_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1.2.3");
    let mut archives = HashMap::new();
    archives.insert(
        "macosx_x64-host_release.zip",
        zip_bytes(&[
            ("libflutter_engine.dylib", b"dylib".as_ref()),
            ("icudtl.dat", b"icu"),
            ("dart", b"dart-vm"),
            ("gen_snapshot", b"snapshotter"),
            ("gen/metadata.dart", b"gen"),
            ("flutter_patched_sdk/version", b"sdk"),
        ]),
    );

    let (downloader, fetched) = FakeDownloader::new(archives);
    let (post_process, calls) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Darwin,
    );

    let slot = cache
        .ensure(Platform::Darwin, BuildMode::Release, Some("abc123"))
        .expect("ensure");

    assert_eq!(
        *fetched.borrow(),
        vec![
            "https://github.com/flutter-rs/engine-builds/releases/download/f-abc123/macosx_x64-host_release.zip"
                .to_string()
        ]
    );
    assert_eq!(
        calls.borrow().rewritten,
        vec![slot.join("libflutter_engine.dylib")]
    );
    assert!(calls.borrow().stripped.is_empty());
    assert!(slot.join("dart").is_file());
    assert!(slot.join("gen_snapshot").is_file());
    assert!(slot.join("gen").join("metadata.dart").is_file());
    assert!(slot.join("flutter_patched_sdk").join("version").is_file());
    assert_eq!(
        fs::read_to_string(slot.join(VERSION_FILE)).expect("marker"),
        "abc123-v1.2.3"
    );
}

#[test]
fn darwin_aot_is_rejected_away_from_macos() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1");
    let (downloader, fetched) = FakeDownloader::empty();
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let error = cache
        .ensure(Platform::Darwin, BuildMode::Release, Some("abc"))
        .expect_err("cross-OS AOT must be rejected");
    assert!(matches!(error, CacheError::DarwinAotCrossBuild));
    assert!(fetched.borrow().is_empty());
}

#[test]
fn windows_release_copies_import_library_and_symbols() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v2");
    let mut archives = HashMap::new();
    archives.insert(
        "windows_x64-host_release.zip",
        zip_bytes(&[
            ("flutter_engine.dll", b"dll".as_ref()),
            ("flutter_engine.dll.exp", b"exp"),
            ("flutter_engine.dll.lib", b"lib"),
            ("flutter_engine.dll.pdb", b"pdb"),
            ("icudtl.dat", b"icu"),
            ("dart.exe", b"dart-vm"),
            ("gen_snapshot.exe", b"snapshotter"),
            ("gen/metadata.dart", b"gen"),
            ("flutter_patched_sdk/version", b"sdk"),
        ]),
    );

    let (downloader, _) = FakeDownloader::new(archives);
    let (post_process, calls) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Windows,
    );

    let slot = cache
        .ensure(Platform::Windows, BuildMode::Release, Some("rev9"))
        .expect("ensure");

    for name in [
        "flutter_engine.dll",
        "flutter_engine.dll.exp",
        "flutter_engine.dll.lib",
        "flutter_engine.dll.pdb",
        "dart.exe",
        "gen_snapshot.exe",
    ] {
        assert!(slot.join(name).is_file(), "missing {}", name);
    }
    assert!(calls.borrow().stripped.is_empty());
    assert!(calls.borrow().rewritten.is_empty());
}

#[test]
fn space_in_cache_path_is_rejected_with_flag_hint() {
    let dir = tempfile::tempdir().expect("temp dir");
    let spaced_root = dir.path().join("with space");
    let context = Context::with_parts(
        dir.path().join("project"),
        spaced_root,
        "v1".to_string(),
        Rc::new(ToolLocator::new()),
        Box::new(StaticVersionOracle {
            engine_revision: "abc".to_string(),
            channel: "stable".to_string(),
        }),
    );
    let (downloader, fetched) = FakeDownloader::empty();
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let error = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect_err("spaced path must be rejected");
    assert!(matches!(error, CacheError::SpaceInCachePath { .. }));
    assert!(error.to_string().contains("--cache-path"));
    assert!(fetched.borrow().is_empty());
}

#[test]
fn missing_engine_library_in_archive_leaves_slot_unstamped() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1");
    let mut archives = HashMap::new();
    archives.insert("linux-x64-embedder", zip_bytes(&[("readme.txt", b"no engine".as_ref())]));
    archives.insert("artifacts.zip", zip_bytes(&[("icudtl.dat", b"icu".as_ref())]));

    let (downloader, _) = FakeDownloader::new(archives);
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );

    let error = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect_err("missing artifact must be fatal");
    assert!(matches!(error, CacheError::MissingArtifact { .. }));
    let slot = slot_dir(context.cache_root(), Platform::Linux, BuildMode::Debug);
    assert!(!slot.join(VERSION_FILE).exists());
}

#[test]
fn clean_removes_all_slots() {
    let dir = tempfile::tempdir().expect("temp dir");
    let context = test_context(dir.path(), "v1.2.3");
    let (downloader, _) = FakeDownloader::new(linux_debug_archives());
    let (post_process, _) = RecordingPostProcess::new();
    let cache = EngineCache::with_parts(
        &context,
        Box::new(downloader),
        Box::new(post_process),
        Platform::Linux,
    );
    let slot = cache
        .ensure(Platform::Linux, BuildMode::Debug, Some("abc"))
        .expect("ensure");
    assert!(slot.exists());

    hover_engine::clean(context.cache_root()).expect("clean");
    assert!(!slot.exists());
}
