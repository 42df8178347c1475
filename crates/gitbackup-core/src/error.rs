//! Error types for gitbackup core.
//!
//! Everything that can go wrong before the first byte reaches the object
//! store lives here: configuration validation, configuration file loading
//! and source tree access.
//!
//! # Example
//!
//! ```
//! use gitbackup_core::{CoreError, Result};
//!
//! fn check_author(name: &str) -> Result<()> {
//!     if name.trim().is_empty() {
//!         return Err(CoreError::invalid_config("author_name", "cannot be empty"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_author("").unwrap_err().is_config_error());
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for gitbackup core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration field is missing or has an invalid value.
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig {
        /// Field that failed validation
        field: String,
        /// Description of the problem
        message: String,
    },

    /// The configured source root does not exist or is not a directory.
    #[error("Source root '{}' does not exist or is not a directory", path.display())]
    SourceRootMissing {
        /// The configured source root
        path: PathBuf,
    },

    /// A configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{}': {message}", path.display())]
    ConfigFile {
        /// Path of the configuration file
        path: PathBuf,
        /// Description of the failure
        message: String,
        /// Underlying error, if any
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an InvalidConfig error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a SourceRootMissing error.
    pub fn source_root_missing(path: impl Into<PathBuf>) -> Self {
        Self::SourceRootMissing { path: path.into() }
    }

    /// Creates a ConfigFile error with a cause.
    pub fn config_file_with_cause<E>(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        cause: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Returns true if this error was caused by configuration, either the
    /// values themselves or the file they were loaded from.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::SourceRootMissing { .. } | Self::ConfigFile { .. }
        )
    }

    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Type alias for Results with CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
