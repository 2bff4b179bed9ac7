use std::fmt;
use std::path::PathBuf;

pub mod container;
pub mod recipes;
pub mod task;

pub use container::{ContainerError, ContainerRunner, DockerRunner};
pub use recipes::{recipe_for, EmbeddedRecipes, RecipeAssets, RecipeSpec};
pub use task::{dist_dir, task_for, PackagingTask, RecipeTask};

use hover_core::project::ProjectError;
use hover_core::{Platform, Target};
use hover_engine::fsops::FsError;

#[derive(Debug)]
pub enum PackError {
    UnknownTarget {
        target: Target,
    },
    NotInitialized {
        target: Target,
    },
    AlreadyInitialized {
        target: Target,
    },
    UnsupportedHost {
        target: Target,
        host: Platform,
        required: Platform,
    },
    MissingBuild {
        path: PathBuf,
    },
    MissingBundle {
        path: PathBuf,
    },
    MissingArtifact {
        path: PathBuf,
    },
    Project(ProjectError),
    Container(ContainerError),
    Copy(FsError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::UnknownTarget { target } => {
                write!(f, "no packaging recipe exists for '{}'", target)
            }
            PackError::NotInitialized { target } => {
                write!(
                    f,
                    "packaging for '{}' is not initialized; run 'hover init-packaging {}' first",
                    target, target
                )
            }
            PackError::AlreadyInitialized { target } => {
                write!(f, "packaging for '{}' is already initialized", target)
            }
            PackError::UnsupportedHost {
                target,
                host,
                required,
            } => {
                write!(
                    f,
                    "packaging '{}' needs a {} host, this is {}",
                    target, required, host
                )
            }
            PackError::MissingBuild { path } => {
                write!(
                    f,
                    "no build output at '{}'; run 'hover build' first",
                    path.display()
                )
            }
            PackError::MissingBundle { path } => {
                write!(
                    f,
                    "no bundle output at '{}'; the bundle target must be packaged first",
                    path.display()
                )
            }
            PackError::MissingArtifact { path } => {
                write!(
                    f,
                    "packaging finished but left no artifact at '{}'",
                    path.display()
                )
            }
            PackError::Project(error) => write!(f, "{}", error),
            PackError::Container(error) => write!(f, "{}", error),
            PackError::Copy(error) => write!(f, "{}", error),
            PackError::Io { path, source } => {
                write!(f, "packaging i/o failed at '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PackError::Project(error) => Some(error),
            PackError::Container(error) => Some(error),
            PackError::Copy(error) => Some(error),
            PackError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
