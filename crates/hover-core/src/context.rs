use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::{self, HoverConfig};
use crate::project::{self, Lockfile, ProjectError, Pubspec};
use crate::tools::ToolLocator;
use crate::version::{FlutterVersionOracle, VersionOracle};

/// Explicit handle threaded through the call graph instead of process-wide
/// globals. Owns the tool locator, the version oracle, and the memoized
/// project files; tests substitute fakes through the `with_*` constructors.
pub struct Context {
    project_root: PathBuf,
    cache_root: PathBuf,
    tool_version: String,
    tools: Rc<ToolLocator>,
    oracle: Box<dyn VersionOracle>,
    pubspec: RefCell<Option<Pubspec>>,
    lockfile: RefCell<Option<Lockfile>>,
    config: RefCell<Option<HoverConfig>>,
}

impl Context {
    pub fn new(project_root: PathBuf, cache_root: PathBuf, tool_version: String) -> Self {
        let tools = Rc::new(ToolLocator::new());
        let oracle = Box::new(FlutterVersionOracle::new(Rc::clone(&tools)));
        Self::assemble(project_root, cache_root, tool_version, tools, oracle)
    }

    pub fn with_parts(
        project_root: PathBuf,
        cache_root: PathBuf,
        tool_version: String,
        tools: Rc<ToolLocator>,
        oracle: Box<dyn VersionOracle>,
    ) -> Self {
        Self::assemble(project_root, cache_root, tool_version, tools, oracle)
    }

    fn assemble(
        project_root: PathBuf,
        cache_root: PathBuf,
        tool_version: String,
        tools: Rc<ToolLocator>,
        oracle: Box<dyn VersionOracle>,
    ) -> Self {
        Context {
            project_root,
            cache_root,
            tool_version,
            tools,
            oracle,
            pubspec: RefCell::new(None),
            lockfile: RefCell::new(None),
            config: RefCell::new(None),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// The running tool's own version, committed into every cache slot's
    /// versionstamp.
    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn tools(&self) -> &ToolLocator {
        &self.tools
    }

    pub fn oracle(&self) -> &dyn VersionOracle {
        self.oracle.as_ref()
    }

    /// Reads and validates the project manifest; memoized for the process.
    pub fn pubspec(&self) -> Result<Pubspec, ProjectError> {
        if let Some(pubspec) = self.pubspec.borrow().as_ref() {
            return Ok(pubspec.clone());
        }
        let pubspec = project::read_pubspec(&self.project_root)?;
        *self.pubspec.borrow_mut() = Some(pubspec.clone());
        Ok(pubspec)
    }

    /// Reads the lock file; memoized for the process.
    pub fn lockfile(&self) -> Result<Lockfile, ProjectError> {
        if let Some(lockfile) = self.lockfile.borrow().as_ref() {
            return Ok(lockfile.clone());
        }
        let lockfile = project::read_lockfile(&self.project_root)?;
        *self.lockfile.borrow_mut() = Some(lockfile.clone());
        Ok(lockfile)
    }

    /// Reads the optional hover.yaml; memoized for the process.
    pub fn config(&self) -> Result<HoverConfig, config::ConfigError> {
        if let Some(config) = self.config.borrow().as_ref() {
            return Ok(config.clone());
        }
        let config = config::read_config(&self.project_root)?;
        *self.config.borrow_mut() = Some(config.clone());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::StaticVersionOracle;

    #[test]
    fn pubspec_is_read_once() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            dir.path().join("pubspec.yaml"),
            "name: cached_app\ndependencies:\n  flutter:\n    sdk: flutter\n",
        )
        .expect("write pubspec");
        let context = Context::with_parts(
            dir.path().to_path_buf(),
            dir.path().join("cache"),
            "v0.0.0-test".to_string(),
            Rc::new(ToolLocator::new()),
            Box::new(StaticVersionOracle {
                engine_revision: "abc".to_string(),
                channel: "stable".to_string(),
            }),
        );
        let first = context.pubspec().expect("first read");
        // Removing the file proves the second read comes from the cache.
        std::fs::remove_file(dir.path().join("pubspec.yaml")).expect("remove pubspec");
        let second = context.pubspec().expect("second read");
        assert_eq!(first.name, second.name);
    }
}
