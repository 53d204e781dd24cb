//! ProcessUploader: runs the external tfcli uploader as a child process
//!
//! # Security Features
//!
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Argument safety**: Every value is a separate argv entry, passed unmodified
//! - **Timeout control**: Optional limit after which the uploader is killed
//! - **Cancellation**: The host can abort the wait; the child is killed on abort
//!
//! # Example
//!
//! ```rust,no_run
//! use threadfix_publisher::{ProcessUploader, UploaderSettings};
//! use std::time::Duration;
//!
//! let mut uploader = ProcessUploader::new(UploaderSettings::default());
//! uploader.set_timeout(Duration::from_secs(600));
//! ```

use crate::core::config::UploaderSettings;
use crate::core::error::UploadError;
use crate::core::traits::{UploadCommand, UploadInvoker, UploadOutcome};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Host side of a cancellation pair
#[derive(Debug)]
pub struct CancelTrigger(watch::Sender<bool>);

/// Uploader side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

/// Create a linked trigger/signal pair
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger(tx), CancelSignal(rx))
}

impl CancelTrigger {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested
    ///
    /// Never resolves if the trigger is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Uploader invoker backed by the external tfcli tool
#[derive(Debug, Clone)]
pub struct ProcessUploader {
    settings: UploaderSettings,
    timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
}

impl ProcessUploader {
    pub fn new(settings: UploaderSettings) -> Self {
        let timeout = settings.timeout_secs.map(Duration::from_secs);
        Self {
            settings,
            timeout,
            cancel: None,
        }
    }

    /// Set uploader timeout.
    ///
    /// Uploads exceeding this duration are killed and reported as
    /// `UploadError::Timeout`.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Abort the uploader wait when `signal` fires
    pub fn with_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Program and argv for an upload
    ///
    /// `.jar` uploaders are started through the configured java launcher.
    pub fn program_and_args(&self, command: &UploadCommand) -> (String, Vec<String>) {
        let is_jar = Path::new(&command.uploader_path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));

        if is_jar {
            let mut args = vec!["-jar".to_string(), command.uploader_path.clone()];
            args.extend(command.arguments());
            (self.settings.java_command.clone(), args)
        } else {
            (command.uploader_path.clone(), command.arguments())
        }
    }

    async fn wait_for_output(
        &self,
        program: &str,
        child: tokio::process::Child,
    ) -> Result<Output, UploadError> {
        let wait_failed = |e: std::io::Error| UploadError::LaunchFailed {
            program: program.to_string(),
            message: format!("wait failed: {}", e),
        };

        let wait = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                    Ok(result) => result.map_err(wait_failed),
                    Err(_) => Err(UploadError::Timeout(limit)),
                },
                None => child.wait_with_output().await.map_err(wait_failed),
            }
        };

        // Dropping `wait` drops the child, which kills it (kill_on_drop)
        match &self.cancel {
            Some(signal) => tokio::select! {
                result = wait => result,
                _ = signal.cancelled() => Err(UploadError::Cancelled),
            },
            None => wait.await,
        }
    }
}

#[async_trait]
impl UploadInvoker for ProcessUploader {
    async fn upload(&self, command: &UploadCommand) -> Result<UploadOutcome, UploadError> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(UploadError::Cancelled);
        }

        let (program, args) = self.program_and_args(command);
        debug!(program = %program, argc = args.len(), "spawning uploader");

        let start = Instant::now();
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| UploadError::LaunchFailed {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let output = self.wait_for_output(&program, child).await?;

        let outcome = UploadOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            duration: start.elapsed(),
            finished_at: Utc::now(),
        };

        if !outcome.succeeded() {
            if !self.settings.accept_nonzero_exit {
                return Err(UploadError::NonZeroExit {
                    code: outcome.exit_code,
                    stderr: outcome.stderr,
                });
            }
            warn!(
                exit_code = ?outcome.exit_code,
                "uploader reported failure, accepted by acceptNonZeroExit"
            );
        }

        Ok(outcome)
    }
}
