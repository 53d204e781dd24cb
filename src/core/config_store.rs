//! Persisted global settings for threadfix-publisher
//!
//! Settings live in a YAML file (`~/.threadfix-publisher.yaml` by default)
//! and can be overridden per process with environment variables:
//!
//! | Variable          | Field  |
//! |-------------------|--------|
//! | `THREADFIX_CLI`   | `tfcli`|
//! | `THREADFIX_URL`   | `url`  |
//! | `THREADFIX_TOKEN` | `token`|
//!
//! Overrides are applied on load and never written back.
//!
//! Readers take an `Arc` snapshot through [`ConfigurationStore::current`];
//! a save replaces the whole snapshot, so a reader sees either the old or
//! the new settings, never a mix.

use super::config::{ConfigurationForm, FieldCheck, GlobalConfiguration, StoredConfiguration};
use crate::core::error::{ConfigError, Field};
use std::collections::HashMap;
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Settings file name
const CONFIG_FILENAME: &str = ".threadfix-publisher.yaml";

/// Environment overrides (variable, form key)
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("THREADFIX_CLI", "tfcli"),
    ("THREADFIX_URL", "url"),
    ("THREADFIX_TOKEN", "token"),
];

/// File-backed store for [`GlobalConfiguration`]
pub struct ConfigurationStore {
    path: PathBuf,
    env: HashMap<String, String>,
    current: RwLock<Arc<GlobalConfiguration>>,
    writer: Mutex<()>,
}

impl ConfigurationStore {
    /// Default settings location: `$HOME/.threadfix-publisher.yaml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home_dir = env::var("HOME").map_err(|_| ConfigError::HomeNotSet)?;
        Ok(PathBuf::from(home_dir).join(CONFIG_FILENAME))
    }

    /// Open the store and load the settings once
    ///
    /// # Arguments
    ///
    /// * `path` - Settings file; a missing file yields empty settings
    /// * `env` - Environment used for overrides
    pub async fn open<P: AsRef<Path>>(
        path: P,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            env,
            current: RwLock::new(Arc::new(GlobalConfiguration::default())),
            writer: Mutex::new(()),
        };

        let loaded = store.load().await?;
        store.replace_snapshot(loaded);

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file and apply environment overrides
    pub async fn load(&self) -> Result<GlobalConfiguration, ConfigError> {
        let mut stored = self.read_file().await?.unwrap_or_default();
        self.apply_env(&mut stored);

        Ok(stored.into())
    }

    /// Snapshot of the settings currently in effect
    pub fn current(&self) -> Arc<GlobalConfiguration> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Persist settings and make them current
    ///
    /// The file is written to a temp file and renamed over the target.
    pub async fn save(&self, config: GlobalConfiguration) -> Result<(), ConfigError> {
        let _writer = self.writer.lock().await;

        let mut stored = StoredConfiguration::from(&config);
        self.write_file(&stored).await?;

        self.apply_env(&mut stored);
        self.replace_snapshot(stored.into());

        info!(path = %self.path.display(), "global settings saved");
        Ok(())
    }

    /// Validate submitted form values and save them
    ///
    /// Fields are checked in form order (`tfcli`, `url`, `token`); the first
    /// invalid field blocks the save. Uploader launch settings are kept.
    pub async fn update(&self, form: ConfigurationForm) -> Result<(), ConfigError> {
        for (key, value) in [
            ("tfcli", &form.tfcli),
            ("url", &form.url),
            ("token", &form.token),
        ] {
            if let FieldCheck::Error(message) = Self::check_field(key, value) {
                return Err(ConfigError::InvalidField { key, message });
            }
        }

        let uploader = self.current().uploader.clone();
        let config = GlobalConfiguration::new(form.tfcli, form.url, form.token).with_uploader(uploader);

        self.save(config).await
    }

    /// Advisory check of a single settings field
    ///
    /// # Examples
    ///
    /// ```
    /// use threadfix_publisher::{ConfigurationStore, FieldCheck};
    ///
    /// assert_eq!(
    ///     ConfigurationStore::check_field("url", "https://threadfix.example.com"),
    ///     FieldCheck::Ok
    /// );
    /// assert!(!ConfigurationStore::check_field("url", "ftp://x").is_ok());
    /// ```
    pub fn check_field(key: &str, value: &str) -> FieldCheck {
        let Some(field) = Field::from_form_key(key) else {
            return FieldCheck::Error(ConfigError::UnknownField(key.to_string()).to_string());
        };

        if field.validator().is_valid(value) {
            FieldCheck::Ok
        } else {
            FieldCheck::Error(field.invalid_message(value))
        }
    }

    fn replace_snapshot(&self, config: GlobalConfiguration) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(config);
    }

    fn apply_env(&self, stored: &mut StoredConfiguration) {
        for (var, key) in ENV_OVERRIDES {
            let Some(value) = self.env.get(*var).filter(|v| !v.is_empty()) else {
                continue;
            };

            debug!(variable = *var, field = *key, "applying environment override");
            match *key {
                "tfcli" => stored.tfcli = value.clone(),
                "url" => stored.url = value.clone(),
                "token" => stored.token = value.clone(),
                _ => {}
            }
        }
    }

    async fn read_file(&self) -> Result<Option<StoredConfiguration>, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "settings file not found, using empty settings");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let stored = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(stored))
    }

    async fn write_file(&self, stored: &StoredConfiguration) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(stored)?;
        let write_error = |source: io::Error| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await.map_err(write_error)?;

        // Atomic write: uniquely named temp file in the target directory, then rename
        let target = self.path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut temp = NamedTempFile::new_in(&dir)?;
            temp.write_all(yaml.as_bytes())?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| write_error(io::Error::other(e)))?
        .map_err(write_error)
    }
}
