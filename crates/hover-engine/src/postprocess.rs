use std::fmt;
use std::path::Path;
use std::process::Command;

pub const ENGINE_INSTALL_NAME: &str = "@executable_path/libflutter_engine.dylib";

/// Post-processing steps applied to freshly copied engine libraries. Split
/// behind a trait so cache tests can record invocations instead of running
/// the real binutils.
pub trait SlotPostProcess {
    /// `strip -s` the engine library, once per refresh.
    fn strip_library(&self, library: &Path) -> Result<(), PostProcessError>;

    /// Rewrite the dylib's install-name and its self-reference so the final
    /// executable resolves the engine next to itself.
    fn rewrite_install_name(&self, library: &Path) -> Result<(), PostProcessError>;
}

pub struct SystemPostProcess;

impl SlotPostProcess for SystemPostProcess {
    fn strip_library(&self, library: &Path) -> Result<(), PostProcessError> {
        let output = Command::new("strip")
            .arg("-s")
            .arg(library)
            .output()
            .map_err(|source| PostProcessError::Spawn {
                tool: "strip",
                source,
            })?;
        check_status("strip", &output)
    }

    fn rewrite_install_name(&self, library: &Path) -> Result<(), PostProcessError> {
        let output = Command::new("install_name_tool")
            .arg("-change")
            .arg("./libflutter_engine.dylib")
            .arg(ENGINE_INSTALL_NAME)
            .arg("-id")
            .arg(ENGINE_INSTALL_NAME)
            .arg(library)
            .output()
            .map_err(|source| PostProcessError::Spawn {
                tool: "install_name_tool",
                source,
            })?;
        check_status("install_name_tool", &output)
    }
}

fn check_status(
    tool: &'static str,
    output: &std::process::Output,
) -> Result<(), PostProcessError> {
    if output.status.success() {
        return Ok(());
    }
    Err(PostProcessError::Failed {
        tool,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[derive(Debug)]
pub enum PostProcessError {
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    Failed {
        tool: &'static str,
        stderr: String,
    },
}

impl fmt::Display for PostProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostProcessError::Spawn { tool, source } => {
                write!(f, "failed to run '{}': {}", tool, source)
            }
            PostProcessError::Failed { tool, stderr } => {
                write!(f, "'{}' failed: {}", tool, stderr)
            }
        }
    }
}

impl std::error::Error for PostProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PostProcessError::Spawn { source, .. } => Some(source),
            PostProcessError::Failed { .. } => None,
        }
    }
}
