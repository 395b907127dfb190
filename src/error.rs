//! Custom error types for grive-utils

use thiserror::Error;

/// Main error type for grive-utils operations
#[derive(Error, Debug)]
pub enum GriveUtilsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed configuration file {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Invalid value '{value}' for option '{key}': expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("grive executable not found in PATH")]
    GriveNotFound,

    #[error("Could not find a version number in grive output: {0:?}")]
    VersionUnparsable(String),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("grive {found} is not supported, version {minimum} or newer is required")]
    UnsupportedVersion { found: String, minimum: String },

    #[error("grive exited with {0}")]
    GriveFailed(std::process::ExitStatus),
}

pub type Result<T> = std::result::Result<T, GriveUtilsError>;

impl GriveUtilsError {
    /// Title for the fatal dialog when the program cannot go on after this
    /// error, `None` for ordinary failures
    pub fn fatal_title(&self) -> Option<&'static str> {
        match self {
            GriveUtilsError::GriveNotFound => Some("grive is not installed"),
            GriveUtilsError::VersionUnparsable(_)
            | GriveUtilsError::InvalidVersion(_)
            | GriveUtilsError::UnsupportedVersion { .. } => Some("Unsupported grive version"),
            GriveUtilsError::ConfigParse { .. } | GriveUtilsError::InvalidValue { .. } => {
                Some("Broken configuration")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_failures_are_fatal() {
        assert!(GriveUtilsError::GriveNotFound.fatal_title().is_some());
        assert!(GriveUtilsError::UnsupportedVersion {
            found: "0.4.0".to_string(),
            minimum: "0.5.1".to_string(),
        }
        .fatal_title()
        .is_some());
        assert!(GriveUtilsError::InvalidVersion("1.x".to_string()).fatal_title().is_some());
        assert!(GriveUtilsError::Config("x".to_string()).fatal_title().is_none());
    }
}
