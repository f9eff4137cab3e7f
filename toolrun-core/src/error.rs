use std::path::PathBuf;
use thiserror::Error;

/// Failure to create the child process. Nothing was run.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Permission denied launching {executable}: {source}")]
    PermissionDenied {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory does not exist: {}", .0.display())]
    WorkingDirectory(PathBuf),

    #[error("Invalid argument string: {0}")]
    InvalidArguments(String),

    #[error("Failed to spawn {executable}: {source}")]
    Io {
        executable: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Map an OS spawn error onto the taxonomy above.
    pub fn from_io(executable: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SpawnError::NotFound(executable.to_string()),
            std::io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied {
                executable: executable.to_string(),
                source: err,
            },
            _ => SpawnError::Io {
                executable: executable.to_string(),
                source: err,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ToolrunError {
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid batch file: {0}")]
    BatchFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolrunError>;
