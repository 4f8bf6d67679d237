use crate::state::StateKey;
use imageforge_cloud::CloudError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A provider call failed during the forward phase
    #[error("{context}: {source}")]
    Cloud {
        context: &'static str,
        source: CloudError,
    },

    #[error("Error generating SSH key: {0}")]
    KeyGeneration(String),

    #[error("Error saving debug key {}: {source}", .path.display())]
    DebugKey {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error connecting to {host}: {source}")]
    Connect { host: String, source: CommError },

    #[error("Provisioner '{name}' failed: {source}")]
    Provision { name: String, source: CommError },

    #[error("Build cancelled")]
    Cancelled,

    #[error("Build state has no '{0}'")]
    MissingState(StateKey),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    pub fn cloud(context: &'static str, source: CloudError) -> Self {
        Self::Cloud { context, source }
    }
}

/// Errors from the remote connection layer
#[derive(Debug, Error)]
pub enum CommError {
    #[error("timed out after {0:?} waiting for SSH")]
    Timeout(Duration),

    #[error("remote command exited with status {0}")]
    ExitStatus(i32),

    #[error("remote command was terminated by a signal")]
    Terminated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("No `image` node found in configuration")]
    MissingImage,

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration:\n{}", bullet_list(.0))]
    Invalid(Vec<String>),
}

fn bullet_list(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Kind of remote resource a cleanup failed to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    SshKey,
    Server,
    Storage,
    Ip,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::SshKey => write!(f, "ssh key"),
            ResourceKind::Server => write!(f, "server"),
            ResourceKind::Storage => write!(f, "storage"),
            ResourceKind::Ip => write!(f, "ip"),
        }
    }
}

/// A resource cleanup could not remove; the operator must delete it by hand
#[derive(Debug, Error)]
#[error("Error destroying {resource} {id}. Please destroy it manually: {source}")]
pub struct CleanupError {
    pub resource: ResourceKind,
    pub id: String,
    pub source: CloudError,
}

impl CleanupError {
    pub fn new(resource: ResourceKind, id: impl Into<String>, source: CloudError) -> Self {
        Self {
            resource,
            id: id.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
