use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use hover_core::layout;
use hover_core::tools::Tool;
use hover_core::Context;
use hover_engine::download::ArtifactDownloader;
use hover_engine::HttpDownloader;

use crate::resolver::{ImportSource, PluginEntry, PluginSource};
use crate::PluginError;

pub const IMPORT_PREFIX: &str = "import-";
pub const IMPORT_SUFFIX: &str = "-plugin.go";

pub fn stub_file_name(plugin: &str) -> String {
    format!("{}{}{}", IMPORT_PREFIX, plugin, IMPORT_SUFFIX)
}

/// Operations against the host build's module descriptor. The production
/// implementation shells out to the host compiler; tests record calls.
pub trait ModuleOps {
    fn get(&self, module: &str, version: &str) -> Result<(), String>;
    fn replace(&self, module: &str, path: &Path) -> Result<(), String>;
    fn drop(&self, module: &str) -> Result<(), String>;
}

pub struct GoModuleOps<'a> {
    context: &'a Context,
}

impl<'a> GoModuleOps<'a> {
    pub fn new(context: &'a Context) -> Self {
        GoModuleOps { context }
    }

    fn run(&self, args: &[&str]) -> Result<(), String> {
        let go = self
            .context
            .tools()
            .locate(Tool::Go)
            .map_err(|error| error.to_string())?;
        let output = Command::new(go)
            .args(args)
            .current_dir(layout::host_build_dir(self.context.project_root()))
            .output()
            .map_err(|error| error.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

impl ModuleOps for GoModuleOps<'_> {
    fn get(&self, module: &str, version: &str) -> Result<(), String> {
        self.run(&["get", &format!("{}@v{}", module, version)])
    }

    fn replace(&self, module: &str, path: &Path) -> Result<(), String> {
        self.run(&[
            "mod",
            "edit",
            &format!("-replace={}={}", module, path.display()),
        ])
    }

    fn drop(&self, module: &str) -> Result<(), String> {
        self.run(&["mod", "edit", &format!("-droprequire={}", module)])?;
        self.run(&["mod", "edit", &format!("-dropreplace={}", module)])
    }
}

/// Generates and maintains one import stub per plugin in the host build's
/// `cmd` directory. All writes go through a single invocation; there are no
/// concurrent writers to guard against.
pub struct PluginImporter<'a> {
    context: &'a Context,
    downloader: Box<dyn ArtifactDownloader>,
    modules: Box<dyn ModuleOps + 'a>,
}

impl<'a> PluginImporter<'a> {
    pub fn new(context: &'a Context) -> Result<Self, PluginError> {
        let downloader = HttpDownloader::new().map_err(PluginError::Download)?;
        Ok(Self::with_parts(
            context,
            Box::new(downloader),
            Box::new(GoModuleOps::new(context)),
        ))
    }

    pub fn with_parts(
        context: &'a Context,
        downloader: Box<dyn ArtifactDownloader>,
        modules: Box<dyn ModuleOps + 'a>,
    ) -> Self {
        PluginImporter {
            context,
            downloader,
            modules,
        }
    }

    /// The `get` operation: make every plugin's import stub exist and point
    /// the module graph at the locked versions.
    pub fn import(&self, entries: &[PluginEntry], force: bool) -> Result<(), PluginError> {
        let cmd_dir = layout::cmd_dir(self.context.project_root());
        fs::create_dir_all(&cmd_dir).map_err(|source| PluginError::Io {
            path: cmd_dir.clone(),
            source,
        })?;

        for entry in entries {
            let stub = cmd_dir.join(stub_file_name(&entry.name));
            if stub.exists() && !force {
                self.realign(entry, &stub);
                continue;
            }
            match &entry.import_source {
                ImportSource::Url(url) => {
                    self.downloader
                        .fetch(url, &stub)
                        .map_err(PluginError::Download)?;
                }
                ImportSource::Template(desktop_dir) => {
                    let template = desktop_dir.join(crate::resolver::TEMPLATE_FILE);
                    fs::copy(&template, &stub).map_err(|source| PluginError::Io {
                        path: template.clone(),
                        source,
                    })?;
                }
                ImportSource::None => {}
            }
            self.pin(entry, &stub);
        }
        Ok(())
    }

    /// Already imported: realign the module graph to the locked version. A
    /// failed realign keeps the previously resolved version.
    fn realign(&self, entry: &PluginEntry, stub: &Path) {
        let Some(module) = module_path_of(stub) else {
            return;
        };
        if let Err(error) = self.modules.get(&module, &entry.version) {
            tracing::warn!(
                plugin = %entry.name,
                version = %entry.version,
                %error,
                "could not re-pin plugin module, keeping the resolved version"
            );
        }
    }

    fn pin(&self, entry: &PluginEntry, stub: &Path) {
        let Some(module) = module_path_of(stub) else {
            if entry.import_source != ImportSource::None {
                tracing::warn!(plugin = %entry.name, "import stub has no module path, skipping version pin");
            }
            return;
        };
        let result = match &entry.source {
            PluginSource::Local { path } => {
                let desktop = path.join(crate::resolver::DESKTOP_DIR);
                self.modules.replace(&module, &desktop)
            }
            PluginSource::Hosted { .. } => self.modules.get(&module, &entry.version),
        };
        if let Err(error) = result {
            tracing::warn!(plugin = %entry.name, %error, "could not pin plugin module version");
        }
    }

    /// The `tidy` operation: remove stubs whose plugin left the lock file
    /// (every stub in purge mode) along with their module requirements.
    pub fn tidy(&self, entries: &[PluginEntry], purge: bool) -> Result<(), PluginError> {
        let cmd_dir = layout::cmd_dir(self.context.project_root());
        if !cmd_dir.is_dir() {
            return Ok(());
        }
        let keep: Vec<String> = if purge {
            Vec::new()
        } else {
            entries.iter().map(|entry| stub_file_name(&entry.name)).collect()
        };

        let listing = fs::read_dir(&cmd_dir).map_err(|source| PluginError::Io {
            path: cmd_dir.clone(),
            source,
        })?;
        for item in listing {
            let item = item.map_err(|source| PluginError::Io {
                path: cmd_dir.clone(),
                source,
            })?;
            let file_name = item.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(IMPORT_PREFIX) || !file_name.ends_with(IMPORT_SUFFIX) {
                continue;
            }
            if keep.contains(&file_name) {
                continue;
            }
            let stub = item.path();
            let module = module_path_of(&stub);
            fs::remove_file(&stub).map_err(|source| PluginError::Io {
                path: stub.clone(),
                source,
            })?;
            if let Some(module) = module {
                if let Err(error) = ModuleOps::drop(&*self.modules, &module) {
                    tracing::warn!(stub = %file_name, %error, "could not drop module requirement");
                }
            }
        }
        Ok(())
    }
}

/// Pulls the imported module path out of a generated stub: the first quoted
/// import that looks like a module path.
pub fn module_path_of(stub: &Path) -> Option<String> {
    let contents = fs::read_to_string(stub).ok()?;
    parse_import_path(&contents)
}

fn parse_import_path(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let mut pieces = line.split('"');
        // The quoted segment sits between the first pair of quotes.
        let _ = pieces.next();
        if let Some(candidate) = pieces.next() {
            if candidate.contains('/') {
                return Some(candidate.to_string());
            }
        }
    }
    None
}
