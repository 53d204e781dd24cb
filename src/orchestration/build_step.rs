//! Build step entry point
//!
//! Binds the per-build parameters, takes the current global settings
//! snapshot and runs the publisher. Failures become a [`StepAbort`] carrying
//! the one-line diagnostic the build log shows.

use super::scan_publisher::ScanPublisher;
use crate::core::config::{GlobalConfiguration, RunParameters};
use crate::core::config_store::ConfigurationStore;
use crate::core::error::{ErrorKind, PublishError};
use crate::core::traits::UploadInvoker;
use crate::security::TokenMasker;
use thiserror::Error;
use tracing::error;

/// Fatal abort of the build step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StepAbort {
    pub message: String,
    pub kind: ErrorKind,
    pub code: &'static str,
}

impl StepAbort {
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// ThreadFix publish step configured for one job
#[derive(Debug, Clone)]
pub struct BuildStep {
    params: RunParameters,
}

impl BuildStep {
    pub fn new(app_id: impl Into<String>, scan_file: impl Into<String>) -> Self {
        Self {
            params: RunParameters::new(app_id, scan_file),
        }
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    /// Run the step against the store's current settings
    ///
    /// Returns `Ok(true)` on success; the boolean is kept for hosts that
    /// still read it. Any failure is a [`StepAbort`].
    pub async fn perform<U: UploadInvoker>(
        &self,
        publisher: &ScanPublisher<U>,
        store: &ConfigurationStore,
    ) -> Result<bool, StepAbort> {
        self.perform_with(publisher, &store.current()).await
    }

    /// Run the step against a settings snapshot the caller already holds
    ///
    /// Use this when the uploader was built from the same snapshot, so a
    /// concurrent save cannot mix old and new settings in one run.
    pub async fn perform_with<U: UploadInvoker>(
        &self,
        publisher: &ScanPublisher<U>,
        config: &GlobalConfiguration,
    ) -> Result<bool, StepAbort> {
        match publisher.publish(&self.params, config).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let abort = Self::abort(&e, &TokenMasker::new(&config.api_token));
                error!(code = abort.code, "{}", abort.message);
                Err(abort)
            }
        }
    }

    fn abort(error: &PublishError, masker: &TokenMasker) -> StepAbort {
        // Validation messages quote the offending value verbatim
        let message = match error.field() {
            Some(_) => error.to_string(),
            None => masker.mask_tokens_in_string(&error.to_string()),
        };

        StepAbort {
            message,
            kind: error.kind(),
            code: error.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UploadError;
    use crate::core::traits::{UploadCommand, UploadOutcome};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{NamedTempFile, TempDir};

    /// Invoker returning a fixed result
    struct StubInvoker {
        result: fn() -> Result<UploadOutcome, UploadError>,
        calls: AtomicUsize,
    }

    impl StubInvoker {
        fn new(result: fn() -> Result<UploadOutcome, UploadError>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UploadInvoker for StubInvoker {
        async fn upload(&self, _command: &UploadCommand) -> Result<UploadOutcome, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn ok_outcome() -> Result<UploadOutcome, UploadError> {
        Ok(UploadOutcome {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration: std::time::Duration::ZERO,
            finished_at: chrono::Utc::now(),
        })
    }

    fn leaking_failure() -> Result<UploadOutcome, UploadError> {
        Err(UploadError::NonZeroExit {
            code: Some(1),
            stderr: "invalid key secret-api-key-0042".to_string(),
        })
    }

    fn cancelled() -> Result<UploadOutcome, UploadError> {
        Err(UploadError::Cancelled)
    }

    async fn configured_store(dir: &TempDir, tfcli: &NamedTempFile) -> ConfigurationStore {
        let store = ConfigurationStore::open(dir.path().join("settings.yaml"), HashMap::new())
            .await
            .unwrap();
        store
            .save(GlobalConfiguration::new(
                tfcli.path().to_str().unwrap(),
                "https://threadfix.example.com",
                "secret-api-key-0042",
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_perform_returns_true_on_success() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let scan = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));

        let step = BuildStep::new("3", scan.path().to_str().unwrap());
        assert_eq!(step.perform(&publisher, &store).await, Ok(true));
        assert_eq!(publisher.invoker().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_perform_aborts_with_field_message() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));

        let abort = BuildStep::new("three", "/nonexistent/scan.xml")
            .perform(&publisher, &store)
            .await
            .unwrap_err();

        assert_eq!(abort.message, "app id \"three\" is invalid");
        assert_eq!(abort.kind, ErrorKind::InvalidParameter);
        assert_eq!(abort.code, "INVALID_PARAMETER");
        assert_eq!(publisher.invoker().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_perform_masks_token_in_abort() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let scan = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(leaking_failure));

        let abort = BuildStep::new("3", scan.path().to_str().unwrap())
            .perform(&publisher, &store)
            .await
            .unwrap_err();

        assert_eq!(abort.kind, ErrorKind::UploadFailure);
        assert!(!abort.message.contains("secret-api-key-0042"));
        assert!(abort.message.contains("sec...042"));
    }

    #[tokio::test]
    async fn test_perform_reports_cancellation() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let scan = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(cancelled));

        let abort = BuildStep::new("3", scan.path().to_str().unwrap())
            .perform(&publisher, &store)
            .await
            .unwrap_err();

        assert!(abort.is_cancelled());
    }

    #[tokio::test]
    async fn test_perform_sees_saved_settings() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let scan = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));
        let step = BuildStep::new("3", scan.path().to_str().unwrap());

        store
            .save(GlobalConfiguration::new(
                tfcli.path().to_str().unwrap(),
                "not a url",
                "key",
            ))
            .await
            .unwrap();

        let abort = step.perform(&publisher, &store).await.unwrap_err();
        assert_eq!(abort.message, "threadfix server url \"not a url\" is invalid");
    }

    #[tokio::test]
    async fn test_short_token_does_not_mangle_message() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let store = ConfigurationStore::open(dir.path().join("settings.yaml"), HashMap::new())
            .await
            .unwrap();
        store
            .save(GlobalConfiguration::new(
                tfcli.path().to_str().unwrap(),
                "https://threadfix.example.com",
                "1",
            ))
            .await
            .unwrap();
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));

        let abort = BuildStep::new("12a", "/x")
            .perform(&publisher, &store)
            .await
            .unwrap_err();

        assert_eq!(abort.message, "app id \"12a\" is invalid");
    }

    #[tokio::test]
    async fn test_validation_message_keeps_value_containing_token() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));

        let abort = BuildStep::new("secret-api-key-0042", "/x")
            .perform(&publisher, &store)
            .await
            .unwrap_err();

        assert_eq!(abort.message, "app id \"secret-api-key-0042\" is invalid");
    }

    #[tokio::test]
    async fn test_perform_with_uses_given_snapshot() {
        let dir = TempDir::new().unwrap();
        let tfcli = NamedTempFile::new().unwrap();
        let scan = NamedTempFile::new().unwrap();
        let store = configured_store(&dir, &tfcli).await;
        let publisher = ScanPublisher::new(StubInvoker::new(ok_outcome));
        let step = BuildStep::new("3", scan.path().to_str().unwrap());

        let snapshot = store.current();
        store
            .save(GlobalConfiguration::new(
                tfcli.path().to_str().unwrap(),
                "not a url",
                "key",
            ))
            .await
            .unwrap();

        assert_eq!(step.perform_with(&publisher, &snapshot).await, Ok(true));
        assert!(step.perform(&publisher, &store).await.is_err());
        assert_eq!(publisher.invoker().calls.load(Ordering::SeqCst), 1);
    }
}
