use std::path::{Path, PathBuf};

use crate::target::{Platform, Target};

/// Name of the host build directory inside a project, by convention.
pub const HOST_BUILD_DIR: &str = "go";

/// Dart entry file used when the project configuration does not name one.
pub const DEFAULT_TARGET_FILE: &str = "lib/main_desktop.dart";

/// Module descriptor manipulated by plugin get/tidy.
pub const MODULE_FILE: &str = "go.mod";

pub fn host_build_dir(project_root: &Path) -> PathBuf {
    project_root.join(HOST_BUILD_DIR)
}

/// Host sources plus the generated `import-<plugin>-plugin.go` stubs.
pub fn cmd_dir(project_root: &Path) -> PathBuf {
    host_build_dir(project_root).join("cmd")
}

/// The project's desktop assets, staged verbatim into the build output.
pub fn assets_dir(project_root: &Path) -> PathBuf {
    host_build_dir(project_root).join("assets")
}

/// Final staging target for a platform build.
pub fn outputs_dir(project_root: &Path, platform: Platform) -> PathBuf {
    host_build_dir(project_root)
        .join("build")
        .join("outputs")
        .join(platform.as_str())
}

/// Native libraries shipped by plugins, copied next to the engine.
pub fn intermediates_dir(project_root: &Path, platform: Platform) -> PathBuf {
    host_build_dir(project_root)
        .join("build")
        .join("intermediates")
        .join(platform.as_str())
}

/// Per-format packaging recipes live under `packaging/<platform>-<format>/`.
pub fn packaging_dir(project_root: &Path, target: Target) -> PathBuf {
    host_build_dir(project_root)
        .join("packaging")
        .join(target.to_string())
}

pub fn module_file(project_root: &Path) -> PathBuf {
    host_build_dir(project_root).join(MODULE_FILE)
}

/// The per-user cache root, unless overridden with `--cache-path`.
pub fn default_cache_root() -> Option<PathBuf> {
    dirs::cache_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Format;

    #[test]
    fn output_tree_lives_under_host_build_dir() {
        let root = Path::new("/work/app");
        assert_eq!(
            outputs_dir(root, Platform::Linux),
            Path::new("/work/app/go/build/outputs/linux")
        );
        assert_eq!(
            intermediates_dir(root, Platform::Windows),
            Path::new("/work/app/go/build/intermediates/windows")
        );
    }

    #[test]
    fn packaging_dir_is_keyed_by_target() {
        let root = Path::new("/work/app");
        let target = Target::packaged(Platform::Linux, Format::Deb);
        assert_eq!(
            packaging_dir(root, target),
            Path::new("/work/app/go/packaging/linux-deb")
        );
    }
}
