use std::path::PathBuf;

use hover_build::{BuildOrchestrator, BuildPlan};
use hover_core::target::parse_targets;
use hover_core::{BuildMode, Context, Platform};
use hover_engine::EngineCache;
use hover_pack::{task_for, DockerRunner, EmbeddedRecipes, PackagingTask};
use hover_plugins::resolver;
use hover_plugins::PluginImporter;

pub struct BuildArgs {
    pub target_spec: Option<String>,
    pub mode: BuildMode,
    pub cache_path: Option<PathBuf>,
    pub engine_version: Option<String>,
    pub vm_arguments: Vec<String>,
}

pub fn run(args: BuildArgs) -> Result<(), String> {
    let context = super::make_context(args.cache_path)?;
    let host = Platform::host().map_err(|error| error.to_string())?;
    let spec = match args.target_spec {
        Some(spec) => spec,
        None => host.to_string(),
    };
    let targets = parse_targets(&spec, false).map_err(|error| error.to_string())?;

    let pubspec = context.pubspec().map_err(|error| error.to_string())?;
    let config = context.config().map_err(|error| error.to_string())?;

    verify_plugins(&context)?;

    for target in &targets {
        if target.platform != host {
            return Err(format!(
                "cannot build for '{}' from a '{}' host; cross-compilation is not supported",
                target.platform, host
            ));
        }
        let cache = EngineCache::new(&context).map_err(|error| error.to_string())?;
        let orchestrator = BuildOrchestrator::new(&context, cache);
        let plan = BuildPlan {
            target: *target,
            mode: args.mode,
            project_name: pubspec.name.clone(),
            target_file: config.target_file().to_string(),
            vm_arguments: args.vm_arguments.clone(),
            engine_revision_override: args
                .engine_version
                .clone()
                .or_else(|| config.engine_version.clone()),
        };
        let outcome = orchestrator.build(&plan).map_err(|error| error.to_string())?;
        println!("build: {}", outcome.executable.display());

        if target.format.is_some() {
            let runner = DockerRunner::new(&context).map_err(|error| error.to_string())?;
            let task = task_for(&context, &runner, &EmbeddedRecipes, host, *target)
                .map_err(|error| error.to_string())?;
            let version = pubspec.version.clone().unwrap_or_else(|| "0.0.1".to_string());
            let artifact = task
                .pack(&version, args.mode)
                .map_err(|error| error.to_string())?;
            println!("package: {}", artifact.display());
        }
    }
    Ok(())
}

/// Makes sure every desktop plugin from the lock file has its import stub
/// before the host compile runs.
fn verify_plugins(context: &Context) -> Result<(), String> {
    let lockfile = context.lockfile().map_err(|error| error.to_string())?;
    let Some(pub_cache) = resolver::pub_cache_dir() else {
        tracing::warn!("could not locate the Dart package cache; skipping plugin verification");
        return Ok(());
    };
    let standalone = hover_plugins::fetch_standalone_list();
    let plugins = resolver::discover_plugins(
        &lockfile,
        context.project_root(),
        &pub_cache,
        &standalone,
    )
    .map_err(|error| error.to_string())?;
    let importer = PluginImporter::new(context).map_err(|error| error.to_string())?;
    importer
        .import(&plugins, false)
        .map_err(|error| error.to_string())
}
