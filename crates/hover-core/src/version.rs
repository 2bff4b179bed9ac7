use std::cell::RefCell;
use std::fmt;
use std::process::Command;
use std::rc::Rc;

use serde::Deserialize;

use crate::tools::{Tool, ToolError, ToolLocator};

/// Answers questions about the installed Flutter toolchain. Implementations
/// are expected to memoize: values are read once per process.
pub trait VersionOracle {
    /// The engine commit the installed toolchain was built against.
    fn engine_revision(&self) -> Result<String, OracleError>;

    /// The release channel of the installed toolchain.
    fn channel(&self) -> Result<String, OracleError>;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlutterVersion {
    pub engine_revision: String,
    pub channel: String,
    #[serde(default)]
    pub framework_version: Option<String>,
    #[serde(default)]
    pub dart_sdk_version: Option<String>,
}

/// Queries `flutter --version --machine` and decodes the JSON body. The
/// driver is known to print prelude text (first-run banners, upgrade notes)
/// before the JSON document, so decoding starts at the first `{` byte.
pub struct FlutterVersionOracle {
    tools: Rc<ToolLocator>,
    cached: RefCell<Option<FlutterVersion>>,
}

impl FlutterVersionOracle {
    pub fn new(tools: Rc<ToolLocator>) -> Self {
        FlutterVersionOracle {
            tools,
            cached: RefCell::new(None),
        }
    }

    fn load(&self) -> Result<FlutterVersion, OracleError> {
        if let Some(version) = self.cached.borrow().as_ref() {
            return Ok(version.clone());
        }
        let flutter = self.tools.locate(Tool::Flutter).map_err(OracleError::Tool)?;
        let output = Command::new(&flutter)
            .args(["--version", "--machine"])
            .output()
            .map_err(OracleError::Io)?;
        if !output.status.success() {
            return Err(OracleError::CommandFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let version = decode_machine_output(&output.stdout)?;
        tracing::debug!(
            engine_revision = %version.engine_revision,
            channel = %version.channel,
            "resolved flutter toolchain version"
        );
        *self.cached.borrow_mut() = Some(version.clone());
        Ok(version)
    }
}

impl VersionOracle for FlutterVersionOracle {
    fn engine_revision(&self) -> Result<String, OracleError> {
        Ok(self.load()?.engine_revision)
    }

    fn channel(&self) -> Result<String, OracleError> {
        Ok(self.load()?.channel)
    }
}

/// Decodes the machine-readable version report, skipping any prelude bytes
/// the driver printed before the JSON document.
pub fn decode_machine_output(stdout: &[u8]) -> Result<FlutterVersion, OracleError> {
    let start = stdout
        .iter()
        .position(|byte| *byte == b'{')
        .ok_or(OracleError::MissingJsonBody)?;
    serde_json::from_slice(&stdout[start..]).map_err(OracleError::Decode)
}

/// Fixed answers, for tests and for callers that already know the revision.
pub struct StaticVersionOracle {
    pub engine_revision: String,
    pub channel: String,
}

impl VersionOracle for StaticVersionOracle {
    fn engine_revision(&self) -> Result<String, OracleError> {
        Ok(self.engine_revision.clone())
    }

    fn channel(&self) -> Result<String, OracleError> {
        Ok(self.channel.clone())
    }
}

#[derive(Debug)]
pub enum OracleError {
    Tool(ToolError),
    Io(std::io::Error),
    CommandFailed {
        status: Option<i32>,
        stderr: String,
    },
    MissingJsonBody,
    Decode(serde_json::Error),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Tool(error) => write!(f, "{}", error),
            OracleError::Io(error) => {
                write!(f, "failed to run 'flutter --version --machine': {}", error)
            }
            OracleError::CommandFailed { status, stderr } => {
                write!(
                    f,
                    "'flutter --version --machine' exited with status {:?}: {}",
                    status, stderr
                )
            }
            OracleError::MissingJsonBody => {
                write!(f, "no JSON body found in flutter version output")
            }
            OracleError::Decode(error) => {
                write!(f, "failed to decode flutter version output: {}", error)
            }
        }
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OracleError::Tool(error) => Some(error),
            OracleError::Io(error) => Some(error),
            OracleError::Decode(error) => Some(error),
            _ => None,
        }
    }
}
