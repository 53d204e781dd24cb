//! Configuration structures for threadfix-publisher
//!
//! Per-run parameters and the globally persisted uploader settings.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters bound to a single publish invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    /// Numeric ThreadFix application id
    pub app_id: String,

    /// Path of the scan artifact to upload
    pub scan_file: String,
}

impl RunParameters {
    pub fn new(app_id: impl Into<String>, scan_file: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            scan_file: scan_file.into(),
        }
    }
}

/// How the uploader process is launched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploaderSettings {
    /// Java launcher used for `.jar` uploaders (default: "java")
    #[serde(rename = "javaCommand")]
    pub java_command: String,

    /// Kill the uploader after this many seconds (default: no limit)
    #[serde(rename = "timeoutSecs", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Treat a non-zero uploader exit as success (default: false)
    #[serde(rename = "acceptNonZeroExit")]
    pub accept_nonzero_exit: bool,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            java_command: "java".to_string(),
            timeout_secs: None,
            accept_nonzero_exit: false,
        }
    }
}

/// Global settings shared by every publish invocation
///
/// Absent values are stored as empty strings and fail validation.
pub struct GlobalConfiguration {
    /// Location of the uploader (tfcli jar or executable)
    pub uploader_path: String,

    /// ThreadFix server url
    pub server_url: String,

    /// ThreadFix api key
    pub api_token: SecretString,

    /// Process launch settings
    pub uploader: UploaderSettings,
}

impl GlobalConfiguration {
    pub fn new(
        uploader_path: impl Into<String>,
        server_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        let api_token: String = api_token.into();
        Self {
            uploader_path: uploader_path.into(),
            server_url: server_url.into(),
            api_token: SecretString::new(api_token.into()),
            uploader: UploaderSettings::default(),
        }
    }

    pub fn with_uploader(mut self, uploader: UploaderSettings) -> Self {
        self.uploader = uploader;
        self
    }
}

impl Default for GlobalConfiguration {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl fmt::Debug for GlobalConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfiguration")
            .field("uploader_path", &self.uploader_path)
            .field("server_url", &self.server_url)
            .field("api_token", &"[REDACTED]")
            .field("uploader", &self.uploader)
            .finish()
    }
}

/// On-disk layout of the settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct StoredConfiguration {
    #[serde(default)]
    pub tfcli: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub uploader: UploaderSettings,
}

impl From<StoredConfiguration> for GlobalConfiguration {
    fn from(stored: StoredConfiguration) -> Self {
        GlobalConfiguration::new(stored.tfcli, stored.url, stored.token).with_uploader(stored.uploader)
    }
}

impl From<&GlobalConfiguration> for StoredConfiguration {
    fn from(config: &GlobalConfiguration) -> Self {
        Self {
            tfcli: config.uploader_path.clone(),
            url: config.server_url.clone(),
            token: config.api_token.expose_secret().to_string(),
            uploader: config.uploader.clone(),
        }
    }
}

/// Values submitted through the admin settings surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationForm {
    pub tfcli: String,
    pub url: String,
    pub token: String,
}

/// Outcome of an on-demand field check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    Ok,
    Error(String),
}

impl FieldCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uploader_settings() {
        let settings = UploaderSettings::default();
        assert_eq!(settings.java_command, "java");
        assert_eq!(settings.timeout_secs, None);
        assert!(!settings.accept_nonzero_exit);
    }

    #[test]
    fn test_deserialize_minimal_settings() {
        let yaml = r#"
tfcli: /opt/threadfix/tfcli.jar
url: http://localhost:8080/threadfix
token: abc123
"#;
        let stored: StoredConfiguration = serde_yaml::from_str(yaml).unwrap();
        let config = GlobalConfiguration::from(stored);

        assert_eq!(config.uploader_path, "/opt/threadfix/tfcli.jar");
        assert_eq!(config.server_url, "http://localhost:8080/threadfix");
        assert_eq!(config.api_token.expose_secret(), "abc123");
        assert_eq!(config.uploader, UploaderSettings::default());
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let stored: StoredConfiguration = serde_yaml::from_str("url: https://tf.example.com\n").unwrap();
        let config = GlobalConfiguration::from(stored);

        assert_eq!(config.uploader_path, "");
        assert_eq!(config.api_token.expose_secret(), "");
    }

    #[test]
    fn test_uploader_block_serialization() {
        let stored = StoredConfiguration {
            uploader: UploaderSettings {
                java_command: "/usr/lib/jvm/bin/java".to_string(),
                timeout_secs: Some(300),
                accept_nonzero_exit: true,
            },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&stored).unwrap();
        assert!(yaml.contains("javaCommand: /usr/lib/jvm/bin/java"));
        assert!(yaml.contains("timeoutSecs: 300"));
        assert!(yaml.contains("acceptNonZeroExit: true"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GlobalConfiguration::new("/opt/tfcli.jar", "https://tf.example.com", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
