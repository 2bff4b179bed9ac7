use hover_core::{BuildMode, Platform};

pub const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";
pub const STORAGE_BASE_ENV: &str = "FLUTTER_STORAGE_BASE_URL";

/// AOT engine archives are published per revision by the engine-builds side
/// project rather than the Flutter storage domain.
pub const AOT_RELEASE_BASE: &str =
    "https://github.com/flutter-rs/engine-builds/releases/download";

/// Archives to fetch for one (platform, mode) refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineSource {
    /// Debug engines come as a per-platform embedder archive plus the shared
    /// `artifacts.zip` holding `icudtl.dat`.
    Debug {
        embedder_url: String,
        artifacts_url: String,
    },
    /// AOT engines ship as a single combined archive.
    Aot { archive_url: String },
}

pub fn engine_source(platform: Platform, mode: BuildMode, revision: &str) -> EngineSource {
    if mode.is_aot() {
        let token = aot_platform_token(platform);
        EngineSource::Aot {
            archive_url: format!(
                "{}/f-{}/{}_x64-host_{}.zip",
                AOT_RELEASE_BASE,
                revision,
                token,
                mode.name()
            ),
        }
    } else {
        let directory = format!(
            "{}/flutter_infra/flutter/{}/{}-x64",
            storage_base(),
            revision,
            platform
        );
        EngineSource::Debug {
            embedder_url: format!("{}/{}-x64-embedder", directory, platform),
            artifacts_url: format!("{}/artifacts.zip", directory),
        }
    }
}

fn storage_base() -> String {
    match std::env::var(STORAGE_BASE_ENV) {
        Ok(base) if !base.is_empty() => base.trim_end_matches('/').to_string(),
        _ => DEFAULT_STORAGE_BASE.to_string(),
    }
}

fn aot_platform_token(platform: Platform) -> &'static str {
    match platform {
        Platform::Linux => "linux",
        Platform::Darwin => "macosx",
        Platform::Windows => "windows",
    }
}
