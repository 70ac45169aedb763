use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the question-csv library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Appending a cleaned record to the output file failed.
    #[error("Failed to write to '{path}': {message}")]
    Write {
        /// Output file path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A second interrupt arrived while the conversion was still running.
    #[error("Interrupted before the conversion finished")]
    Interrupted,

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// External template failed validation.
    #[error("Invalid template '{path}': {reason}")]
    TemplateValidation {
        /// Template path
        path: String,
        /// Reason why the template was rejected
        reason: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// No API key was configured for the model service.
    #[error("No API key configured (set OPENAI_API_KEY or pass --api-key)")]
    MissingApiKey,

    /// Transport-level failure talking to the model service.
    #[error("HTTP request to model service failed: {message}")]
    Http {
        /// Error message
        message: String,
    },

    /// Model service answered with a non-success status.
    #[error("Model service returned {status}: {body}")]
    ApiStatus {
        /// HTTP status code
        status: u16,
        /// Response body, as returned by the service
        body: String,
    },

    /// Model service answered without any completion choice.
    #[error("Model service returned no completion")]
    EmptyResponse,

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates an output write error.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // tera keeps the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = std::error::Error::source(inner);
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::TemplateValidation { .. })
    }

    /// Returns true if this is an output write error.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Returns true if the error came from cleaning a single record.
    ///
    /// These errors are recoverable: the record is skipped and the run goes on.
    #[must_use]
    pub const fn is_cleaner(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey
                | Self::Http { .. }
                | Self::ApiStatus { .. }
                | Self::EmptyResponse
                | Self::Template { .. }
                | Self::Serialization { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/input.sql", io_err);
        assert!(err.is_io());
        assert!(!err.is_cleaner());
        assert!(err.to_string().contains("/tmp/input.sql"));
    }

    #[test]
    fn test_write_error_is_not_a_cleaner_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let err = Error::write("output.csv", io_err);
        assert!(err.is_write());
        assert!(!err.is_cleaner());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_cleaner_errors() {
        assert!(Error::MissingApiKey.is_cleaner());
        assert!(Error::EmptyResponse.is_cleaner());

        let err = Error::ApiStatus {
            status: 401,
            body: "invalid key".to_string(),
        };
        assert!(err.is_cleaner());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::config("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_interrupted_is_not_recoverable() {
        let err = Error::Interrupted;
        assert!(!err.is_cleaner());
        assert!(err.to_string().contains("Interrupted"));
    }
}
