use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod release_check;

#[derive(Parser)]
#[command(name = "hover", version, about = "Build and package Flutter desktop applications")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the project for one or more targets; packaged targets are
    /// handed to the containerized packager afterwards.
    Build {
        /// Comma-separated target list, e.g. "linux", "linux-deb", "*-*".
        /// Defaults to the bare host platform.
        target: Option<String>,
        /// Build an ahead-of-time release binary.
        #[arg(long)]
        release: bool,
        /// Build an ahead-of-time profile binary.
        #[arg(long, conflicts_with = "release")]
        profile: bool,
        /// Engine cache location (must not contain spaces).
        #[arg(long)]
        cache_path: Option<PathBuf>,
        /// Pin the engine revision instead of asking the Flutter toolchain.
        #[arg(long)]
        engine_version: Option<String>,
        /// Extra argument for the embedded VM (repeatable).
        #[arg(long = "vm-argument")]
        vm_arguments: Vec<String>,
    },
    /// Generate per-format packaging recipes under go/packaging/.
    InitPackaging {
        /// Target list; every item needs a packaging format.
        target: String,
    },
    /// Maintain desktop plugin import stubs.
    Plugins {
        #[command(subcommand)]
        command: PluginsCommand,
    },
    /// Remove every cached engine.
    CleanCache {
        #[arg(long)]
        cache_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PluginsCommand {
    /// Generate import stubs for the plugins in the lock file, realigning
    /// already imported ones to their locked versions.
    Get {
        /// Rewrite stubs even when they already exist.
        #[arg(long)]
        force: bool,
    },
    /// Drop import stubs whose plugin left the lock file.
    Tidy {
        /// Drop every import stub.
        #[arg(long)]
        purge: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
    if let Err(message) = run_cli() {
        exit_with_error(&message);
    }
}

fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    release_check::check_for_update(concat!("v", env!("CARGO_PKG_VERSION")));
    match cli.command {
        Command::Build {
            target,
            release,
            profile,
            cache_path,
            engine_version,
            vm_arguments,
        } => {
            let mode = if release {
                hover_core::BuildMode::Release
            } else if profile {
                hover_core::BuildMode::Profile
            } else {
                hover_core::BuildMode::Debug
            };
            commands::build::run(commands::build::BuildArgs {
                target_spec: target,
                mode,
                cache_path,
                engine_version,
                vm_arguments,
            })
        }
        Command::InitPackaging { target } => commands::init_packaging::run(&target),
        Command::Plugins { command } => match command {
            PluginsCommand::Get { force } => commands::plugins::get(force),
            PluginsCommand::Tidy { purge } => commands::plugins::tidy(purge),
        },
        Command::CleanCache { cache_path } => commands::clean_cache::run(cache_path),
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}
