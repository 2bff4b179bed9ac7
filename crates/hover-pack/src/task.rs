use std::fs;
use std::path::{Path, PathBuf};

use hover_core::layout;
use hover_core::{BuildMode, Context, Format, Platform, Target};
use hover_engine::fsops;

use crate::container::ContainerRunner;
use crate::recipes::{recipe_for, render, RecipeAssets, RecipeSpec};
use crate::PackError;

/// Uniform capability set every packaging format implements. The driver
/// treats the format itself as opaque: recipes and commands are data.
pub trait PackagingTask {
    fn name(&self) -> String;
    fn is_initialized(&self) -> bool;
    /// Generate the per-format recipe and template files under
    /// `<hostBuildDir>/packaging/<platform>-<format>/`.
    fn init(&self) -> Result<(), PackError>;
    /// Fail fast when the host OS cannot run this format's container.
    fn assert_supported(&self) -> Result<(), PackError>;
    /// Stage a completed build output, run the format's command inside a
    /// container, and relocate the resulting artifact.
    fn pack(&self, project_version: &str, mode: BuildMode) -> Result<PathBuf, PackError>;
}

/// Where relocated artifacts end up.
pub fn dist_dir(project_root: &Path, target: Target) -> PathBuf {
    layout::host_build_dir(project_root)
        .join("build")
        .join("outputs")
        .join(target.to_string())
}

pub struct RecipeTask<'a> {
    context: &'a Context,
    runner: &'a dyn ContainerRunner,
    assets: &'a dyn RecipeAssets,
    host: Platform,
    spec: &'static RecipeSpec,
}

/// Looks up the packaging task for a target; bare targets and unknown
/// combinations have none.
pub fn task_for<'a>(
    context: &'a Context,
    runner: &'a dyn ContainerRunner,
    assets: &'a dyn RecipeAssets,
    host: Platform,
    target: Target,
) -> Result<RecipeTask<'a>, PackError> {
    let spec = recipe_for(target).ok_or(PackError::UnknownTarget { target })?;
    Ok(RecipeTask {
        context,
        runner,
        assets,
        host,
        spec,
    })
}

impl RecipeTask<'_> {
    fn target(&self) -> Target {
        self.spec.target()
    }

    fn recipe_dir(&self) -> PathBuf {
        layout::packaging_dir(self.context.project_root(), self.target())
    }

    fn project_name(&self) -> Result<String, PackError> {
        Ok(self.context.pubspec().map_err(PackError::Project)?.name)
    }

    fn image_tag(&self) -> String {
        format!("hover-build-packaging-{}", self.spec.format)
    }

    /// Stage recipe files (version placeholders rendered) and the build
    /// output, then hand the tree to the container.
    fn run_packaging(
        &self,
        name: &str,
        version: &str,
        mode: BuildMode,
    ) -> Result<PathBuf, PackError> {
        let project_root = self.context.project_root();
        let recipe_dir = self.recipe_dir();
        let staging = tempfile::Builder::new()
            .prefix("staging-")
            .tempdir_in(&recipe_dir)
            .map_err(|source| PackError::Io {
                path: recipe_dir.clone(),
                source,
            })?;

        let outputs = layout::outputs_dir(project_root, self.spec.platform);
        if !outputs.is_dir() {
            return Err(PackError::MissingBuild { path: outputs });
        }
        fsops::copy_tree(&outputs, &staging.path().join("build")).map_err(PackError::Copy)?;

        for file in self.spec.extra_files {
            let source = recipe_dir.join(file.name);
            let contents =
                fs::read_to_string(&source).map_err(|io| PackError::Io { path: source, source: io })?;
            fs::write(
                staging.path().join(file.name),
                render(&contents, name, version, mode.name()),
            )
            .map_err(|io| PackError::Io {
                path: staging.path().join(file.name),
                source: io,
            })?;
        }

        if self.spec.needs_bundle {
            let bundle_dist = dist_dir(
                project_root,
                Target::packaged(self.spec.platform, Format::Bundle),
            );
            if !bundle_dist.is_dir() {
                return Err(PackError::MissingBundle { path: bundle_dist });
            }
            fsops::copy_tree(&bundle_dist, staging.path()).map_err(PackError::Copy)?;
        }

        let tag = self.image_tag();
        self.runner
            .build_image(&tag, &recipe_dir)
            .map_err(PackError::Container)?;
        let command = assemble_command(self.spec.commands, name, version, mode, self.host);
        self.runner
            .run(&tag, staging.path(), &command)
            .map_err(PackError::Container)?;

        let artifact = staging
            .path()
            .join(render(self.spec.artifact, name, version, mode.name()));
        if !artifact.exists() {
            return Err(PackError::MissingArtifact { path: artifact });
        }
        let dist = dist_dir(project_root, self.target());
        fs::create_dir_all(&dist).map_err(|source| PackError::Io {
            path: dist.clone(),
            source,
        })?;
        let destination = dist.join(render(self.spec.artifact, name, version, mode.name()));
        relocate(&artifact, &destination)?;
        Ok(destination)
    }
}

impl PackagingTask for RecipeTask<'_> {
    fn name(&self) -> String {
        self.target().to_string()
    }

    fn is_initialized(&self) -> bool {
        self.recipe_dir().join("Dockerfile").is_file()
    }

    fn init(&self) -> Result<(), PackError> {
        if self.is_initialized() {
            return Err(PackError::AlreadyInitialized {
                target: self.target(),
            });
        }
        let name = self.project_name()?;
        let recipe_dir = self.recipe_dir();
        fs::create_dir_all(&recipe_dir).map_err(|source| PackError::Io {
            path: recipe_dir.clone(),
            source,
        })?;
        let files = self
            .assets
            .files(self.target(), &name)
            .ok_or(PackError::UnknownTarget {
                target: self.target(),
            })?;
        for (file_name, contents) in files {
            let path = recipe_dir.join(&file_name);
            fs::write(&path, contents).map_err(|source| PackError::Io { path, source })?;
        }
        Ok(())
    }

    fn assert_supported(&self) -> Result<(), PackError> {
        if let Some(required) = self.spec.requires_host {
            if self.host != required {
                return Err(PackError::UnsupportedHost {
                    target: self.target(),
                    host: self.host,
                    required,
                });
            }
        }
        Ok(())
    }

    fn pack(&self, project_version: &str, mode: BuildMode) -> Result<PathBuf, PackError> {
        self.assert_supported()?;
        if !self.is_initialized() {
            return Err(PackError::NotInitialized {
                target: self.target(),
            });
        }
        let name = self.project_name()?;
        tracing::info!(format = %self.target(), version = project_version, "packaging build output");
        self.run_packaging(&name, project_version, mode)
    }
}

fn assemble_command(
    commands: &[&str],
    name: &str,
    version: &str,
    mode: BuildMode,
    host: Platform,
) -> String {
    let mut rendered: Vec<String> = commands
        .iter()
        .map(|command| render(command, name, version, mode.name()))
        .collect();
    if host != Platform::Windows {
        if let Some(fixup) = ownership_fixup() {
            rendered.push(fixup);
        }
    }
    rendered.join(" && ")
}

/// Containers write as root; hand the outputs back to the invoking user.
#[cfg(unix)]
fn ownership_fixup() -> Option<String> {
    let uid = id_value("-u")?;
    let gid = id_value("-g")?;
    Some(format!("chown {}:{} * -R", uid, gid))
}

#[cfg(not(unix))]
fn ownership_fixup() -> Option<String> {
    None
}

#[cfg(unix)]
fn id_value(flag: &str) -> Option<String> {
    let output = std::process::Command::new("id").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn relocate(source: &Path, destination: &Path) -> Result<(), PackError> {
    if destination.is_dir() {
        fs::remove_dir_all(destination).map_err(|io| PackError::Io {
            path: destination.to_path_buf(),
            source: io,
        })?;
    } else if destination.exists() {
        fs::remove_file(destination).map_err(|io| PackError::Io {
            path: destination.to_path_buf(),
            source: io,
        })?;
    }
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    // Staging and dist may sit on different filesystems.
    if source.is_dir() {
        fsops::copy_tree(source, destination).map_err(PackError::Copy)?;
        fs::remove_dir_all(source).map_err(|io| PackError::Io {
            path: source.to_path_buf(),
            source: io,
        })
    } else {
        fsops::copy_file(source, destination).map_err(PackError::Copy)?;
        fs::remove_file(source).map_err(|io| PackError::Io {
            path: source.to_path_buf(),
            source: io,
        })
    }
}
