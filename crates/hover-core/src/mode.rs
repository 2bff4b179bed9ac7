use std::fmt;
use std::str::FromStr;

/// Build mode for a single invocation. The AOT modes require a compiled
/// application snapshot and pull extra tooling into the engine cache slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Debug,
    Profile,
    Release,
}

impl BuildMode {
    pub fn name(self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Profile => "profile",
            BuildMode::Release => "release",
        }
    }

    pub fn is_aot(self) -> bool {
        !matches!(self, BuildMode::Debug)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildMode {
    type Err = BuildModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "debug" => Ok(BuildMode::Debug),
            "profile" => Ok(BuildMode::Profile),
            "release" => Ok(BuildMode::Release),
            other => Err(BuildModeError::Unknown(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildModeError {
    Unknown(String),
}

impl fmt::Display for BuildModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildModeError::Unknown(value) => {
                write!(f, "unknown build mode '{}'", value)
            }
        }
    }
}

impl std::error::Error for BuildModeError {}
