//! Core traits and types for scan uploads
//!
//! This module defines the command handed to the uploader and the
//! abstraction over whatever performs the upload.

use crate::core::error::UploadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Upload Command
// ============================================================================

/// Fully validated values for a single upload; never persisted
pub struct UploadCommand {
    pub uploader_path: String,
    pub app_id: String,
    pub scan_file: String,
    pub server_url: String,
    pub api_token: SecretString,
}

impl UploadCommand {
    /// Uploader arguments following the tfcli grammar
    ///
    /// Values are passed through unmodified, one argv entry each.
    pub fn arguments(&self) -> Vec<String> {
        vec![
            "-s".to_string(),
            "url".to_string(),
            self.server_url.clone(),
            "-s".to_string(),
            "key".to_string(),
            self.api_token.expose_secret().to_string(),
            "-u".to_string(),
            self.app_id.clone(),
            self.scan_file.clone(),
        ]
    }
}

impl fmt::Debug for UploadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCommand")
            .field("uploader_path", &self.uploader_path)
            .field("app_id", &self.app_id)
            .field("scan_file", &self.scan_file)
            .field("server_url", &self.server_url)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Upload Outcome
// ============================================================================

/// Result of a completed uploader run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Exit code, `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ============================================================================
// Upload Invoker Trait
// ============================================================================

/// Performs the actual transfer of a scan to the server
///
/// The publisher calls this exactly once per successful validation pass.
#[async_trait]
pub trait UploadInvoker: Send + Sync {
    /// Upload the scan described by `command`
    async fn upload(&self, command: &UploadCommand) -> Result<UploadOutcome, UploadError>;
}
