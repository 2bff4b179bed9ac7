use std::path::PathBuf;

use hover_core::{BuildMode, Target};

/// Everything one `build <target>` invocation needs; assembled by the CLI
/// and destroyed with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildPlan {
    pub target: Target,
    pub mode: BuildMode,
    pub project_name: String,
    /// Dart entry file handed to the asset bundler.
    pub target_file: String,
    /// Joined with `;` and injected into the host binary's main package.
    pub vm_arguments: Vec<String>,
    /// Pins the engine revision instead of asking the version oracle.
    pub engine_revision_override: Option<String>,
}

/// What a completed build left on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOutcome {
    pub output_dir: PathBuf,
    pub engine_slot: PathBuf,
    pub executable: PathBuf,
}
