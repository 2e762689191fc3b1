//! Error types for rcp-cli

use recuperar::RecuperarError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// Source path does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Source path exists but is not a regular file
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    /// Destination exists and --overwrite was not given
    #[error("Destination exists (pass --overwrite to replace): {0}")]
    DestinationExists(PathBuf),

    /// Bad component selection or precision
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Library error
    #[error("{0}")]
    Recuperar(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) | Self::NotAFile(_) => ExitCode::from(3),
            Self::DestinationExists(_) => ExitCode::from(4),
            Self::InvalidSelection(_) => ExitCode::from(2),
            Self::Recuperar(_) => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(7),
        }
    }
}

impl From<RecuperarError> for CliError {
    fn from(e: RecuperarError) -> Self {
        match e {
            RecuperarError::InvalidSelection { message } => Self::InvalidSelection(message),
            other => Self::Recuperar(other.to_string()),
        }
    }
}
