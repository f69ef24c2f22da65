//! Error types for HDFS client operations

use thiserror::Error;

use crate::types::OpenMode;

/// Coarse classification of [`HdfsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection to the namenode could not be established
    Connection,
    /// The operation was attempted in the wrong state or with bad arguments
    Precondition,
    /// The native layer reported a failure for a specific call
    Io,
    /// The configuration could not be loaded
    Config,
}

/// Errors that can occur during HDFS client operations
#[derive(Debug, Error)]
pub enum HdfsError {
    #[error("Connection to {endpoint} failed (code {code})")]
    Connection { endpoint: String, code: i32 },

    #[error("Filesystem not connected")]
    NotConnected,

    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    #[error("File is closed: {0}")]
    Closed(String),

    #[error("{op} not permitted on {path} opened for {mode}")]
    WrongMode {
        op: &'static str,
        path: String,
        mode: OpenMode,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File open failed for {path} (code {code})")]
    OpenFailed { path: String, code: i32 },

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("{op} failed with code {code}")]
    Io { op: &'static str, code: i32 },

    #[error("Short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },

    #[error("Config error: {0}")]
    Config(#[from] hdfsconfig::ConfigError),
}

impl HdfsError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HdfsError::Connection { .. } => ErrorKind::Connection,
            HdfsError::NotConnected
            | HdfsError::AlreadyConnected(_)
            | HdfsError::Closed(_)
            | HdfsError::WrongMode { .. }
            | HdfsError::InvalidArgument(_) => ErrorKind::Precondition,
            HdfsError::OpenFailed { .. }
            | HdfsError::NotFound(_)
            | HdfsError::Io { .. }
            | HdfsError::ShortWrite { .. } => ErrorKind::Io,
            HdfsError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }

    /// Native error code carried by this error, if any
    pub fn native_code(&self) -> Option<i32> {
        match self {
            HdfsError::Connection { code, .. }
            | HdfsError::OpenFailed { code, .. }
            | HdfsError::Io { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<HdfsError> for std::io::Error {
    fn from(e: HdfsError) -> Self {
        let kind = match &e {
            HdfsError::NotFound(_) => std::io::ErrorKind::NotFound,
            HdfsError::ShortWrite { .. } => std::io::ErrorKind::WriteZero,
            HdfsError::InvalidArgument(_) => std::io::ErrorKind::InvalidInput,
            HdfsError::NotConnected => std::io::ErrorKind::NotConnected,
            HdfsError::Closed(_) | HdfsError::WrongMode { .. } => {
                std::io::ErrorKind::PermissionDenied
            }
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

/// Result type alias for HDFS client operations
pub type Result<T> = std::result::Result<T, HdfsError>;
