use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use hover_core::tools::Tool;
use hover_core::Context;

/// Minimal protocol against the container runtime. Kept behind a trait so
/// tests can substitute an in-process runner.
pub trait ContainerRunner {
    fn build_image(&self, tag: &str, recipe_dir: &Path) -> Result<(), ContainerError>;

    /// Runs `command` through a shell inside the image, with `mount_dir`
    /// bind-mounted at `/app` as the working directory.
    fn run(&self, tag: &str, mount_dir: &Path, command: &str) -> Result<(), ContainerError>;
}

pub struct DockerRunner {
    binary: PathBuf,
}

impl DockerRunner {
    pub fn new(context: &Context) -> Result<Self, ContainerError> {
        let binary = context
            .tools()
            .locate(Tool::Docker)
            .map_err(|error| ContainerError::Runtime(error.to_string()))?;
        Ok(DockerRunner { binary })
    }
}

impl ContainerRunner for DockerRunner {
    fn build_image(&self, tag: &str, recipe_dir: &Path) -> Result<(), ContainerError> {
        let status = Command::new(&self.binary)
            .arg("build")
            .arg("-t")
            .arg(tag)
            .arg(recipe_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ContainerError::Spawn {
                action: "docker build",
                source,
            })?;
        if !status.success() {
            return Err(ContainerError::Failed {
                action: "docker build",
                status,
            });
        }
        Ok(())
    }

    fn run(&self, tag: &str, mount_dir: &Path, command: &str) -> Result<(), ContainerError> {
        let status = Command::new(&self.binary)
            .arg("run")
            .arg("--rm")
            .arg("-v")
            .arg(format!("{}:/app", mount_dir.display()))
            .arg("-w")
            .arg("/app")
            .arg(tag)
            .arg("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ContainerError::Spawn {
                action: "docker run",
                source,
            })?;
        if !status.success() {
            return Err(ContainerError::Failed {
                action: "docker run",
                status,
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ContainerError {
    Runtime(String),
    Spawn {
        action: &'static str,
        source: std::io::Error,
    },
    Failed {
        action: &'static str,
        status: std::process::ExitStatus,
    },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::Runtime(message) => write!(f, "{}", message),
            ContainerError::Spawn { action, source } => {
                write!(f, "failed to run {}: {}", action, source)
            }
            ContainerError::Failed { action, status } => {
                write!(f, "{} exited with {}", action, status)
            }
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}
