use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

pub const PUBSPEC_FILE: &str = "pubspec.yaml";
pub const LOCKFILE_FILE: &str = "pubspec.lock";

/// The parsed project manifest. A manifest without a `flutter` dependency is
/// not a Flutter project and is rejected outright.
#[derive(Clone, Debug, Deserialize)]
pub struct Pubspec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, serde_yaml::Value>,
}

pub fn read_pubspec(project_root: &Path) -> Result<Pubspec, ProjectError> {
    let path = project_root.join(PUBSPEC_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|source| ProjectError::NotAProject {
        file: PUBSPEC_FILE,
        source,
    })?;
    let pubspec: Pubspec =
        serde_yaml::from_str(&contents).map_err(|source| ProjectError::Decode {
            file: PUBSPEC_FILE,
            source,
        })?;
    if !pubspec.dependencies.contains_key("flutter") {
        return Err(ProjectError::NotFlutter);
    }
    Ok(pubspec)
}

#[derive(Clone, Debug, Deserialize)]
pub struct Lockfile {
    pub packages: BTreeMap<String, LockPackage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LockPackage {
    pub description: PackageDescription,
    pub version: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// The lock file's `description` field is polymorphic: a bare string is the
/// first-party SDK sentinel, a mapping describes either a local-path package
/// or a hosted one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackageDescription {
    Sdk(String),
    Hosted { name: Option<String>, url: Option<String> },
    Path { path: String, relative: bool },
}

impl PackageDescription {
    pub fn is_sdk(&self) -> bool {
        matches!(self, PackageDescription::Sdk(_))
    }
}

impl<'de> Deserialize<'de> for PackageDescription {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        match value {
            serde_yaml::Value::String(sentinel) => Ok(PackageDescription::Sdk(sentinel)),
            serde_yaml::Value::Mapping(map) => {
                if let Some(path) = string_field(&map, "path") {
                    let relative = map
                        .get(serde_yaml::Value::from("relative"))
                        .and_then(serde_yaml::Value::as_bool)
                        .unwrap_or(false);
                    Ok(PackageDescription::Path { path, relative })
                } else {
                    Ok(PackageDescription::Hosted {
                        name: string_field(&map, "name"),
                        url: string_field(&map, "url"),
                    })
                }
            }
            other => Err(D::Error::custom(format!(
                "package description must be a string or a mapping, got {:?}",
                other
            ))),
        }
    }
}

fn string_field(map: &serde_yaml::Mapping, key: &str) -> Option<String> {
    map.get(serde_yaml::Value::from(key))
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
}

pub fn read_lockfile(project_root: &Path) -> Result<Lockfile, ProjectError> {
    let path = project_root.join(LOCKFILE_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|source| ProjectError::NotAProject {
        file: LOCKFILE_FILE,
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ProjectError::Decode {
        file: LOCKFILE_FILE,
        source,
    })
}

#[derive(Debug)]
pub enum ProjectError {
    NotAProject {
        file: &'static str,
        source: std::io::Error,
    },
    Decode {
        file: &'static str,
        source: serde_yaml::Error,
    },
    NotFlutter,
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::NotAProject { file, source } => {
                write!(
                    f,
                    "failed to read '{}': {}; run hover from the root of a Flutter project",
                    file, source
                )
            }
            ProjectError::Decode { file, source } => {
                write!(f, "failed to parse '{}': {}", file, source)
            }
            ProjectError::NotFlutter => {
                write!(
                    f,
                    "pubspec.yaml does not declare a 'flutter' dependency; this does not look like a Flutter project"
                )
            }
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::NotAProject { source, .. } => Some(source),
            ProjectError::Decode { source, .. } => Some(source),
            ProjectError::NotFlutter => None,
        }
    }
}
