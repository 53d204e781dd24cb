//! Error handling for scan publishing
//!
//! This module provides the error types for validation, upload and
//! configuration failures, with recovery guidance, using the thiserror crate.

use crate::validation::Validator;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fields checked by the publisher, in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AppId,
    ScanFile,
    UploaderPath,
    ServerUrl,
    ApiToken,
}

impl Field {
    /// All fields in the order the publisher validates them
    pub const ORDER: [Field; 5] = [
        Field::AppId,
        Field::ScanFile,
        Field::UploaderPath,
        Field::ServerUrl,
        Field::ApiToken,
    ];

    /// Field name as reported in errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppId => "appId",
            Self::ScanFile => "scanFile",
            Self::UploaderPath => "uploaderPath",
            Self::ServerUrl => "serverUrl",
            Self::ApiToken => "apiToken",
        }
    }

    /// Key of the persisted settings form, for global fields
    pub fn form_key(&self) -> Option<&'static str> {
        match self {
            Self::UploaderPath => Some("tfcli"),
            Self::ServerUrl => Some("url"),
            Self::ApiToken => Some("token"),
            Self::AppId | Self::ScanFile => None,
        }
    }

    /// Resolve a settings form key back to its field
    pub fn from_form_key(key: &str) -> Option<Field> {
        match key {
            "tfcli" => Some(Self::UploaderPath),
            "url" => Some(Self::ServerUrl),
            "token" => Some(Self::ApiToken),
            _ => None,
        }
    }

    /// Rule this field must satisfy
    pub fn validator(&self) -> Validator {
        match self {
            Self::AppId => Validator::NumericIdentifier,
            Self::ScanFile | Self::UploaderPath => Validator::ReadableFile,
            Self::ServerUrl => Validator::HttpUrl,
            Self::ApiToken => Validator::NonEmptyString,
        }
    }

    /// Per-run parameter (as opposed to global configuration)
    pub fn is_parameter(&self) -> bool {
        matches!(self, Self::AppId | Self::ScanFile)
    }

    /// Human-readable diagnostic for an invalid value
    pub fn invalid_message(&self, value: &str) -> String {
        match self {
            Self::AppId => format!("app id \"{}\" is invalid", value),
            Self::ScanFile => format!("scan file \"{}\" is invalid or file is unreadable", value),
            Self::UploaderPath => format!(
                "threadfix-cli jar \"{}\" is invalid or file is unreadable",
                value
            ),
            Self::ServerUrl => format!("threadfix server url \"{}\" is invalid", value),
            Self::ApiToken => format!("threadfix server api key \"{}\" is invalid", value),
        }
    }
}

/// Classification of a publish failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    InvalidConfiguration,
    UploadFailure,
    Cancelled,
}

/// Failure of the external uploader
#[derive(Error, Debug)]
pub enum UploadError {
    /// The uploader process could not be started
    #[error("failed to launch uploader '{program}': {message}")]
    LaunchFailed { program: String, message: String },

    /// The uploader ran but reported failure
    #[error("uploader exited with status {}: {stderr}", display_code(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// The uploader did not finish in time and was killed
    #[error("uploader timed out after {0:?}")]
    Timeout(Duration),

    /// The host interrupted the wait
    #[error("upload cancelled")]
    Cancelled,
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Main error type for publish operations
#[derive(Error, Debug)]
pub enum PublishError {
    /// A per-run parameter failed its validator
    #[error("{}", .field.invalid_message(.value))]
    InvalidParameter { field: Field, value: String },

    /// A global setting failed its validator
    #[error("{}", .field.invalid_message(.value))]
    InvalidConfiguration { field: Field, value: String },

    /// The uploader could not complete the upload
    #[error("upload failed: {0}")]
    Upload(UploadError),

    /// The host interrupted the upload
    #[error("publish cancelled while waiting for the uploader")]
    Cancelled,
}

impl From<UploadError> for PublishError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::Cancelled => Self::Cancelled,
            other => Self::Upload(other),
        }
    }
}

impl PublishError {
    /// Build the validation error for a field, picking the kind from the field
    pub fn invalid(field: Field, value: impl Into<String>) -> Self {
        let value = value.into();
        if field.is_parameter() {
            Self::InvalidParameter { field, value }
        } else {
            Self::InvalidConfiguration { field, value }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            Self::Upload(_) => ErrorKind::UploadFailure,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Field that failed validation, if any
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::InvalidParameter { field, .. } | Self::InvalidConfiguration { field, .. } => {
                Some(*field)
            }
            Self::Upload(_) | Self::Cancelled => None,
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::Upload(UploadError::LaunchFailed { .. }) => "UPLOAD_LAUNCH_FAILED",
            Self::Upload(UploadError::NonZeroExit { .. }) => "UPLOAD_FAILED",
            Self::Upload(UploadError::Timeout(_)) => "UPLOAD_TIMEOUT",
            Self::Upload(UploadError::Cancelled) | Self::Cancelled => "CANCELLED",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidParameter { field: Field::AppId, .. } => {
                vec!["Use the numeric application id shown in ThreadFix"]
            }
            Self::InvalidParameter { .. } => vec![
                "Check that the scanner wrote its report before this step",
                "Check the scan file path relative to the workspace",
            ],
            Self::InvalidConfiguration { .. } => vec![
                "Run `threadfix-publisher configure` to fix the global settings",
                "Check THREADFIX_CLI, THREADFIX_URL and THREADFIX_TOKEN overrides",
            ],
            Self::Upload(UploadError::LaunchFailed { .. }) => vec![
                "Check that the uploader (or java for .jar uploaders) is installed",
                "Check the uploader file permissions",
            ],
            Self::Upload(UploadError::NonZeroExit { .. }) => vec![
                "Check the uploader output above",
                "Check that the server url and api key are correct",
            ],
            Self::Upload(UploadError::Timeout(_)) => vec![
                "Check network access to the ThreadFix server",
                "Raise uploader.timeoutSecs in the settings file",
            ],
            Self::Upload(UploadError::Cancelled) | Self::Cancelled => vec![],
        }
    }
}

/// Errors raised while loading, checking or saving global settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("HOME environment variable not set")]
    HomeNotSet,

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// A form field failed validation; blocks the save
    #[error("[{key}] {message}")]
    InvalidField { key: &'static str, message: String },

    #[error("unknown settings field '{0}' (expected tfcli, url or token)")]
    UnknownField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_and_order() {
        let names: Vec<_> = Field::ORDER.iter().map(Field::name).collect();
        assert_eq!(
            names,
            vec!["appId", "scanFile", "uploaderPath", "serverUrl", "apiToken"]
        );
    }

    #[test]
    fn test_form_keys_round_trip() {
        for key in ["tfcli", "url", "token"] {
            let field = Field::from_form_key(key).unwrap();
            assert_eq!(field.form_key(), Some(key));
        }
        assert_eq!(Field::from_form_key("appId"), None);
        assert_eq!(Field::AppId.form_key(), None);
    }

    #[test]
    fn test_invalid_picks_kind_from_field() {
        let error = PublishError::invalid(Field::AppId, "abc");
        assert_eq!(error.kind(), ErrorKind::InvalidParameter);
        assert_eq!(error.field(), Some(Field::AppId));
        assert_eq!(error.code(), "INVALID_PARAMETER");

        let error = PublishError::invalid(Field::ServerUrl, "ftp://x");
        assert_eq!(error.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(error.field(), Some(Field::ServerUrl));
    }

    #[test]
    fn test_messages_name_field_and_value() {
        assert_eq!(
            PublishError::invalid(Field::AppId, "12a").to_string(),
            "app id \"12a\" is invalid"
        );
        assert_eq!(
            PublishError::invalid(Field::ScanFile, "/tmp/missing.xml").to_string(),
            "scan file \"/tmp/missing.xml\" is invalid or file is unreadable"
        );
        assert_eq!(
            PublishError::invalid(Field::UploaderPath, "").to_string(),
            "threadfix-cli jar \"\" is invalid or file is unreadable"
        );
        assert_eq!(
            PublishError::invalid(Field::ServerUrl, "not a url").to_string(),
            "threadfix server url \"not a url\" is invalid"
        );
        assert_eq!(
            PublishError::invalid(Field::ApiToken, "").to_string(),
            "threadfix server api key \"\" is invalid"
        );
    }

    #[test]
    fn test_cancelled_upload_maps_to_cancelled() {
        let error = PublishError::from(UploadError::Cancelled);
        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert!(matches!(error, PublishError::Cancelled));
    }

    #[test]
    fn test_upload_failure_kind_and_code() {
        let error = PublishError::from(UploadError::NonZeroExit {
            code: Some(2),
            stderr: "401 Unauthorized".to_string(),
        });

        assert_eq!(error.kind(), ErrorKind::UploadFailure);
        assert_eq!(error.code(), "UPLOAD_FAILED");
        assert_eq!(error.field(), None);
        assert!(error.to_string().contains("401 Unauthorized"));
        assert!(!error.suggested_actions().is_empty());
    }

    #[test]
    fn test_exit_by_signal_display() {
        let error = UploadError::NonZeroExit {
            code: None,
            stderr: String::new(),
        };
        assert!(error.to_string().contains("signal"));
    }

    #[test]
    fn test_timeout_code() {
        let error = PublishError::from(UploadError::Timeout(Duration::from_secs(5)));
        assert_eq!(error.code(), "UPLOAD_TIMEOUT");
        assert!(error.to_string().contains("5s"));
    }
}
