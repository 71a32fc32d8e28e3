use std::{fmt, path::PathBuf};

use machine_learning::MlErr;

/// All errors that can occur while fine-tuning.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any data is loaded.
    InvalidConfig(String),
    /// The configuration file isn't valid JSON or doesn't match the expected options.
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The configured backbone isn't in the registry.
    UnknownBackbone {
        name: String,
        supported: Vec<&'static str>,
    },
    /// A checkpoint file is missing, corrupt or doesn't fit the model.
    Checkpoint { path: PathBuf, msg: String },
    /// A dataset file is missing or malformed.
    Dataset { path: PathBuf, msg: String },
    /// The training core failed.
    Ml(MlErr),
    /// An underlying I/O error not covered by the above variants.
    Io(std::io::Error),
}

impl OrchestratorError {
    pub(crate) fn checkpoint(path: impl Into<PathBuf>, msg: impl fmt::Display) -> Self {
        Self::Checkpoint {
            path: path.into(),
            msg: msg.to_string(),
        }
    }

    pub(crate) fn dataset(path: impl Into<PathBuf>, msg: impl fmt::Display) -> Self {
        Self::Dataset {
            path: path.into(),
            msg: msg.to_string(),
        }
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ParseConfig { path, source } => {
                write!(f, "cannot parse config {}: {source}", path.display())
            }
            Self::UnknownBackbone { name, supported } => {
                write!(f, "unknown backbone {name:?}, expected one of {supported:?}")
            }
            Self::Checkpoint { path, msg } => write!(f, "checkpoint {}: {msg}", path.display()),
            Self::Dataset { path, msg } => write!(f, "dataset {}: {msg}", path.display()),
            Self::Ml(e) => write!(f, "training error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ParseConfig { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}
