//! Scan Publisher - validation and upload orchestration
//!
//! Runs the publish workflow for one build:
//! - Per-run parameter validation (app id, scan file)
//! - Global settings validation (uploader, server url, api key)
//! - Upload through an [`UploadInvoker`]
//!
//! Validation is fail-fast in a fixed order; the first invalid value aborts
//! the run and nothing is uploaded.

use crate::core::config::{GlobalConfiguration, RunParameters};
use crate::core::error::{Field, PublishError};
use crate::core::traits::{UploadCommand, UploadInvoker, UploadOutcome};
use crate::security::TokenMasker;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

/// Publishes scan artifacts to ThreadFix
///
/// Holds no settings between calls; global configuration is passed into
/// every [`ScanPublisher::publish`] call.
pub struct ScanPublisher<U> {
    invoker: U,
}

impl<U: UploadInvoker> ScanPublisher<U> {
    pub fn new(invoker: U) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &U {
        &self.invoker
    }

    /// Validate every value and upload the scan
    ///
    /// # Arguments
    ///
    /// * `params` - App id and scan file for this run
    /// * `config` - Global settings snapshot
    ///
    /// # Returns
    ///
    /// The uploader outcome, or the first validation/upload failure
    pub async fn publish(
        &self,
        params: &RunParameters,
        config: &GlobalConfiguration,
    ) -> Result<UploadOutcome, PublishError> {
        let masker = TokenMasker::new(&config.api_token);

        info!("beginning threadfix publisher execution");

        Self::check(Field::AppId, &params.app_id)?;
        info!("using app id: {}", params.app_id);

        Self::check(Field::ScanFile, &params.scan_file)?;
        info!("using scan file: {}", params.scan_file);

        info!("retrieving global configurations");

        Self::check(Field::UploaderPath, &config.uploader_path)?;
        info!("using tfcli: {}", config.uploader_path);

        Self::check(Field::ServerUrl, &config.server_url)?;
        info!("using threadfix server url: {}", config.server_url);

        Self::check(Field::ApiToken, config.api_token.expose_secret())?;
        info!("using token: {}", masker.masked_token());

        let command = UploadCommand {
            uploader_path: config.uploader_path.clone(),
            app_id: params.app_id.clone(),
            scan_file: params.scan_file.clone(),
            server_url: config.server_url.clone(),
            api_token: SecretString::new(config.api_token.expose_secret().into()),
        };

        info!("uploading scan file");
        let outcome = self.invoker.upload(&command).await.inspect_err(|e| {
            warn!("upload failed: {}", masker.mask_tokens_in_string(&e.to_string()));
        })?;

        for line in outcome.stdout.lines() {
            info!("tfcli: {}", masker.mask_tokens_in_string(line));
        }
        info!(
            elapsed_ms = outcome.duration.as_millis() as u64,
            "threadfix publisher execution complete"
        );

        Ok(outcome)
    }

    fn check(field: Field, value: &str) -> Result<(), PublishError> {
        let validator = field.validator();
        debug!(field = field.name(), rule = validator.name(), "validating");

        if validator.is_valid(value) {
            Ok(())
        } else {
            Err(PublishError::invalid(field, value))
        }
    }
}
