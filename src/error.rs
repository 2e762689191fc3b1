//! Error types for recuperar operations.
//!
//! Provides rich error context for library consumers. I/O and format
//! failures are fatal and propagate to the caller; a missing scale is
//! only fatal in strict mode (the engine reports it and defaults the
//! multiplier otherwise).

use std::fmt;

/// Main error type for recuperar operations.
///
/// # Examples
///
/// ```
/// use recuperar::error::RecuperarError;
///
/// let err = RecuperarError::ShapeMismatch {
///     name: "x".to_string(),
///     expected: 720,
///     actual: 600,
/// };
/// assert!(err.to_string().contains("720"));
/// ```
#[derive(Debug)]
pub enum RecuperarError {
    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Checkpoint could not be loaded (I/O or container format error).
    LoadFailure {
        /// Error description
        message: String,
    },

    /// Checkpoint could not be saved.
    SaveFailure {
        /// Error description
        message: String,
    },

    /// Invalid or corrupt tensor data.
    FormatError {
        /// Error description
        message: String,
    },

    /// No scale source found for a reduced-precision tensor (strict mode only;
    /// outside strict mode the engine defaults the multiplier to 1.0).
    MissingScale {
        /// Base key the resolver searched from
        base: String,
    },

    /// A scale source tensor holds more than one element.
    ///
    /// Resolving against a non-scalar is a contract violation; the engine
    /// rejects it instead of silently indexing.
    ScaleNotScalar {
        /// Offending key
        key: String,
        /// Element count found
        elements: usize,
    },

    /// Recorded shape disagrees with the stored element count on restore.
    ShapeMismatch {
        /// Tensor name
        name: String,
        /// Element count implied by the recorded shape
        expected: usize,
        /// Element count actually stored
        actual: usize,
    },

    /// Invalid component or bucket selection (rejected at the boundary,
    /// never reaches the engines).
    InvalidSelection {
        /// Error description
        message: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for RecuperarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecuperarError::Io(e) => write!(f, "I/O error: {e}"),
            RecuperarError::LoadFailure { message } => {
                write!(f, "Failed to load checkpoint: {message}")
            }
            RecuperarError::SaveFailure { message } => {
                write!(f, "Failed to save checkpoint: {message}")
            }
            RecuperarError::FormatError { message } => {
                write!(f, "Invalid tensor format: {message}")
            }
            RecuperarError::MissingScale { base } => {
                write!(f, "No scale source found for '{base}'")
            }
            RecuperarError::ScaleNotScalar { key, elements } => {
                write!(
                    f,
                    "Scale source '{key}' holds {elements} elements, expected a scalar"
                )
            }
            RecuperarError::ShapeMismatch {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Shape mismatch for '{name}': recorded shape implies {expected} elements, tensor holds {actual}"
                )
            }
            RecuperarError::InvalidSelection { message } => {
                write!(f, "Invalid selection: {message}")
            }
            RecuperarError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RecuperarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecuperarError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecuperarError {
    fn from(err: std::io::Error) -> Self {
        RecuperarError::Io(err)
    }
}

impl From<&str> for RecuperarError {
    fn from(msg: &str) -> Self {
        RecuperarError::Other(msg.to_string())
    }
}

impl From<String> for RecuperarError {
    fn from(msg: String) -> Self {
        RecuperarError::Other(msg)
    }
}

impl RecuperarError {
    /// Create a load failure with descriptive context
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::LoadFailure {
            message: message.into(),
        }
    }

    /// Create a save failure with descriptive context
    #[must_use]
    pub fn save(message: impl Into<String>) -> Self {
        Self::SaveFailure {
            message: message.into(),
        }
    }

    /// Create a format error with descriptive context
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, RecuperarError>;
