use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use hover_core::layout;
use hover_core::tools::{Tool, ToolError};
use hover_core::{BuildMode, Context, Platform};
use hover_engine::cache::{engine_files, CacheError, EngineCache, ICU_DATA_FILE};
use hover_engine::fsops::{self, FsError};

use crate::plan::{BuildOutcome, BuildPlan};

/// Name of the AOT application snapshot next to the engine in the output.
pub const AOT_SNAPSHOT_FILE: &str = "app.so";

pub struct BuildOrchestrator<'a> {
    context: &'a Context,
    cache: EngineCache<'a>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(context: &'a Context, cache: EngineCache<'a>) -> Self {
        BuildOrchestrator { context, cache }
    }

    /// Runs the whole per-target pipeline. Every step either succeeds or
    /// fails the invocation; there is no partial success.
    pub fn build(&self, plan: &BuildPlan) -> Result<BuildOutcome, BuildError> {
        let platform = plan.target.platform;
        let project_root = self.context.project_root();
        tracing::info!(build_target = %plan.target, mode = %plan.mode, "building");

        // Prior plugin intermediates must survive, so the tree is created,
        // never wiped.
        let output_dir = layout::outputs_dir(project_root, platform);
        fs::create_dir_all(&output_dir).map_err(|source| BuildError::Io {
            path: output_dir.clone(),
            source,
        })?;

        let engine_slot = self
            .cache
            .ensure(platform, plan.mode, plan.engine_revision_override.as_deref())
            .map_err(BuildError::Cache)?;

        self.bundle_assets(plan, &output_dir, &engine_slot)?;

        stage_engine(&engine_slot, &output_dir, platform, plan.mode)?;
        stage_assets(project_root, &output_dir)?;
        stage_plugin_intermediates(project_root, &output_dir, platform)?;

        self.download_modules()?;
        let executable = self.compile_host(plan, &output_dir, &engine_slot)?;

        Ok(BuildOutcome {
            output_dir,
            engine_slot,
            executable,
        })
    }

    /// Step 3: `flutter build bundle`. AOT modes also need the snapshotter
    /// from the engine slot on the search path.
    fn bundle_assets(
        &self,
        plan: &BuildPlan,
        output_dir: &Path,
        engine_slot: &Path,
    ) -> Result<(), BuildError> {
        let flutter = self
            .context
            .tools()
            .locate(Tool::Flutter)
            .map_err(BuildError::Tool)?;
        let asset_dir = output_dir.join("flutter_assets");
        let mut command = Command::new(flutter);
        command
            .arg("build")
            .arg("bundle")
            .arg("--asset-dir")
            .arg(&asset_dir)
            .arg("--target")
            .arg(&plan.target_file)
            .current_dir(self.context.project_root())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if plan.mode.is_aot() {
            command.arg(format!("--{}", plan.mode.name()));
            command.arg("--precompiled");
            command.env("PATH", prepend_search_path(engine_slot)?);
        }
        run(command, "flutter build bundle")
    }

    /// Step 8: materialize the host dependency graph.
    fn download_modules(&self) -> Result<(), BuildError> {
        let go = self.context.tools().locate(Tool::Go).map_err(BuildError::Tool)?;
        let mut command = Command::new(go);
        command
            .arg("mod")
            .arg("download")
            .current_dir(layout::host_build_dir(self.context.project_root()))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        run(command, "go mod download")
    }

    /// Step 9: compile the host binary against the cached engine.
    fn compile_host(
        &self,
        plan: &BuildPlan,
        output_dir: &Path,
        engine_slot: &Path,
    ) -> Result<PathBuf, BuildError> {
        let platform = plan.target.platform;
        let go = self.context.tools().locate(Tool::Go).map_err(BuildError::Tool)?;
        let executable = output_dir.join(format!(
            "{}{}",
            plan.project_name,
            platform.exe_suffix()
        ));
        let snapshot = plan
            .mode
            .is_aot()
            .then(|| output_dir.join(AOT_SNAPSHOT_FILE));

        let mut command = Command::new(go);
        command
            .arg("build")
            .arg("-o")
            .arg(&executable)
            .arg("-ldflags")
            .arg(ldflags(&plan.vm_arguments, snapshot.as_deref()))
            .arg("./cmd")
            .env("CGO_LDFLAGS", cgo_ldflags(platform, engine_slot))
            .current_dir(layout::host_build_dir(self.context.project_root()))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        run(command, "go build")?;
        Ok(executable)
    }
}

/// Steps 4 and 5: engine files and the ICU data, copied from the slot into
/// the output tree.
pub fn stage_engine(
    engine_slot: &Path,
    output_dir: &Path,
    platform: Platform,
    mode: BuildMode,
) -> Result<(), BuildError> {
    for name in engine_files(platform, mode) {
        let source = engine_slot.join(name);
        let destination = output_dir.join(name);
        if source.is_dir() {
            fsops::copy_tree(&source, &destination).map_err(BuildError::Copy)?;
        } else {
            fsops::copy_file(&source, &destination).map_err(BuildError::Copy)?;
        }
    }
    fsops::copy_file(
        &engine_slot.join(ICU_DATA_FILE),
        &output_dir.join(ICU_DATA_FILE),
    )
    .map_err(BuildError::Copy)
}

/// Step 6: the project's desktop assets, staged under `assets/`.
pub fn stage_assets(project_root: &Path, output_dir: &Path) -> Result<(), BuildError> {
    let assets = layout::assets_dir(project_root);
    if !assets.is_dir() {
        return Ok(());
    }
    fsops::copy_tree(&assets, &output_dir.join("assets")).map_err(BuildError::Copy)
}

/// Step 7: native libraries the plugins ship, staged next to the engine.
pub fn stage_plugin_intermediates(
    project_root: &Path,
    output_dir: &Path,
    platform: Platform,
) -> Result<(), BuildError> {
    let intermediates = layout::intermediates_dir(project_root, platform);
    if !intermediates.is_dir() {
        return Ok(());
    }
    fsops::copy_tree(&intermediates, output_dir).map_err(BuildError::Copy)
}

/// Linker environment for the host compile: the engine slot enters either
/// the framework or the library search path.
pub fn cgo_ldflags(platform: Platform, engine_slot: &Path) -> String {
    match platform {
        Platform::Darwin => format!(
            "-F{} -Wl,-rpath,@executable_path",
            engine_slot.display()
        ),
        Platform::Linux | Platform::Windows => format!("-L{}", engine_slot.display()),
    }
}

/// Constants injected into the host binary's main package.
pub fn ldflags(vm_arguments: &[String], aot_snapshot: Option<&Path>) -> String {
    let mut flags = format!("-X main.vmArguments={}", vm_arguments.join(";"));
    if let Some(snapshot) = aot_snapshot {
        flags.push_str(&format!(" -X main.aotSnapshotPath={}", snapshot.display()));
    }
    flags
}

fn prepend_search_path(engine_slot: &Path) -> Result<std::ffi::OsString, BuildError> {
    let existing = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![engine_slot.to_path_buf()];
    paths.extend(std::env::split_paths(&existing));
    std::env::join_paths(paths).map_err(|error| BuildError::SearchPath {
        message: error.to_string(),
    })
}

fn run(mut command: Command, action: &'static str) -> Result<(), BuildError> {
    let status = command.status().map_err(|source| BuildError::Spawn {
        action,
        source,
    })?;
    if !status.success() {
        return Err(BuildError::CommandFailed { action, status });
    }
    Ok(())
}

#[derive(Debug)]
pub enum BuildError {
    Cache(CacheError),
    Tool(ToolError),
    Copy(FsError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Spawn {
        action: &'static str,
        source: std::io::Error,
    },
    CommandFailed {
        action: &'static str,
        status: std::process::ExitStatus,
    },
    SearchPath {
        message: String,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Cache(error) => write!(f, "{}", error),
            BuildError::Tool(error) => write!(f, "{}", error),
            BuildError::Copy(error) => write!(f, "{}", error),
            BuildError::Io { path, source } => {
                write!(f, "build i/o failed at '{}': {}", path.display(), source)
            }
            BuildError::Spawn { action, source } => {
                write!(f, "failed to run {}: {}", action, source)
            }
            BuildError::CommandFailed { action, status } => {
                write!(f, "{} exited with {}", action, status)
            }
            BuildError::SearchPath { message } => {
                write!(f, "could not extend PATH with the engine slot: {}", message)
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Cache(error) => Some(error),
            BuildError::Tool(error) => Some(error),
            BuildError::Copy(error) => Some(error),
            BuildError::Io { source, .. } => Some(source),
            BuildError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}
