use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::layout;

pub const CONFIG_FILE: &str = "hover.yaml";

/// Optional per-project configuration, read from `go/hover.yaml`. Every
/// field has a default so the file can be absent entirely.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct HoverConfig {
    /// Dart entry file handed to the asset bundler.
    #[serde(default)]
    pub target: Option<String>,
    /// Forces packaging through the container runtime even for formats that
    /// could run natively.
    #[serde(default)]
    pub docker: Option<bool>,
    /// Pins the engine revision instead of asking the installed toolchain.
    #[serde(default)]
    pub engine_version: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl HoverConfig {
    pub fn target_file(&self) -> &str {
        self.target.as_deref().unwrap_or(layout::DEFAULT_TARGET_FILE)
    }
}

pub fn read_config(project_root: &Path) -> Result<HoverConfig, ConfigError> {
    let path = layout::host_build_dir(project_root).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(HoverConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
    serde_yaml::from_str(&contents).map_err(ConfigError::Yaml)
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(error) => write!(f, "failed to read hover.yaml: {}", error),
            ConfigError::Yaml(error) => write!(f, "failed to parse hover.yaml: {}", error),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(error) => Some(error),
            ConfigError::Yaml(error) => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = read_config(dir.path()).expect("config");
        assert_eq!(config, HoverConfig::default());
        assert_eq!(config.target_file(), layout::DEFAULT_TARGET_FILE);
    }

    #[test]
    fn config_fields_decode() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let go_dir = layout::host_build_dir(dir.path());
        std::fs::create_dir_all(&go_dir).expect("create go dir");
        std::fs::write(
            go_dir.join(CONFIG_FILE),
            "target: lib/main.dart\ndocker: true\nengine-version: abc123\n",
        )
        .expect("write config");
        let config = read_config(dir.path()).expect("config");
        assert_eq!(config.target_file(), "lib/main.dart");
        assert_eq!(config.docker, Some(true));
        assert_eq!(config.engine_version.as_deref(), Some("abc123"));
    }
}
