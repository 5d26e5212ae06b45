use crate::event::StageKind;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid ratio format: {0}")]
    Format(String),
    #[error("Failed to parse media information: {0}")]
    Parse(String),
    #[error("{tool} failed with exit code {exit_code}")]
    ExternalTool { tool: String, exit_code: i32 },
    #[error("Failed to prepare working directory {}: {source}", path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid argument provided: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: StageKind, message: String },
    #[error("A run is already in progress")]
    Busy,
    #[error("Aborted by request")]
    Aborted,
}

impl Error {
    pub fn setup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Setup { path: path.into(), source }
    }

    pub fn external_tool(tool: impl Into<String>, exit_code: i32) -> Self {
        Error::ExternalTool { tool: tool.into(), exit_code }
    }

    /// Exit code of the failing tool, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::ExternalTool { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
