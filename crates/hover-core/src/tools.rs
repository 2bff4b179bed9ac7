use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// External executables the tool orchestrates. `git` and the container
/// runtime are optional: their absence only matters on code paths that
/// actually shell out to them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Flutter,
    Go,
    Git,
    Docker,
}

impl Tool {
    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Flutter => "flutter",
            Tool::Go => "go",
            Tool::Git => "git",
            Tool::Docker => "docker",
        }
    }

    pub fn install_hint(self) -> &'static str {
        match self {
            Tool::Flutter => "https://flutter.dev/docs/get-started/install",
            Tool::Go => "https://golang.org/doc/install",
            Tool::Git => "https://git-scm.com/downloads",
            Tool::Docker => "https://docs.docker.com/install",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

pub trait ToolFinder {
    fn find(&self, binary: &str) -> Option<PathBuf>;
}

/// Resolves binaries through the `PATH` of the running process.
pub struct SystemToolFinder;

impl ToolFinder for SystemToolFinder {
    fn find(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }
}

/// Lazily resolves absolute paths to external executables. Each tool is
/// looked up at most once per process; the resolved path is memoized.
pub struct ToolLocator {
    finder: Box<dyn ToolFinder>,
    resolved: RefCell<HashMap<Tool, PathBuf>>,
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::with_finder(Box::new(SystemToolFinder))
    }

    pub fn with_finder(finder: Box<dyn ToolFinder>) -> Self {
        ToolLocator {
            finder,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    pub fn locate(&self, tool: Tool) -> Result<PathBuf, ToolError> {
        if let Some(path) = self.resolved.borrow().get(&tool) {
            return Ok(path.clone());
        }
        let path = self
            .finder
            .find(tool.binary_name())
            .ok_or(ToolError::Missing {
                name: tool.binary_name(),
                hint: tool.install_hint(),
            })?;
        self.resolved.borrow_mut().insert(tool, path.clone());
        Ok(path)
    }
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolError {
    Missing {
        name: &'static str,
        hint: &'static str,
    },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Missing { name, hint } => {
                write!(
                    f,
                    "failed to find the '{}' executable on PATH; install it from {}",
                    name, hint
                )
            }
        }
    }
}

impl std::error::Error for ToolError {}
