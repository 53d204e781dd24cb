//! Value validators for publisher parameters and global settings
//!
//! Each validator classifies a raw string for one semantic role. Validators
//! are total: every input, including the empty string, yields a boolean and
//! never an error.

use regex::Regex;
use reqwest::Url;
use std::fs::File;
use std::path::Path;

/// Authority of an http(s) url: optional user info, a dns name or ip
/// literal, optional port
const AUTHORITY_PATTERN: &str = r"^(?:[A-Za-z0-9%._~!$&'()*+,;=-]+(?::[A-Za-z0-9%._~!$&'()*+,;=-]*)?@)?(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.?|\[[0-9A-Fa-f:.]+\])(?::[0-9]{1,5})?$";

/// Closed set of validation rules applied to publisher fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Non-empty, ASCII decimal digits only
    NumericIdentifier,
    /// Existing regular file the current process can open for reading
    ReadableFile,
    /// Absolute `http` or `https` URL with a host; local hosts allowed
    HttpUrl,
    /// Any string with at least one character
    NonEmptyString,
}

impl Validator {
    /// Check a value against this rule
    ///
    /// # Examples
    ///
    /// ```
    /// use threadfix_publisher::Validator;
    ///
    /// assert!(Validator::NumericIdentifier.is_valid("42"));
    /// assert!(!Validator::NumericIdentifier.is_valid("-42"));
    /// assert!(Validator::HttpUrl.is_valid("http://localhost:8080/api"));
    /// assert!(!Validator::HttpUrl.is_valid("ftp://x"));
    /// ```
    pub fn is_valid(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }

        match self {
            Self::NumericIdentifier => value.chars().all(|c| c.is_ascii_digit()),
            Self::ReadableFile => Self::is_readable_file(Path::new(value)),
            Self::HttpUrl => Self::is_http_url(value),
            Self::NonEmptyString => true,
        }
    }

    /// Check a value that may be absent; `None` is never valid
    pub fn is_valid_opt(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.is_valid(v))
    }

    /// Short rule name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::NumericIdentifier => "numeric-identifier",
            Self::ReadableFile => "readable-file",
            Self::HttpUrl => "http-url",
            Self::NonEmptyString => "non-empty",
        }
    }

    fn is_readable_file(path: &Path) -> bool {
        let Ok(metadata) = path.metadata() else {
            return false;
        };

        metadata.is_file() && File::open(path).is_ok()
    }

    /// Rejects input the url parser would otherwise repair: whitespace,
    /// backslashes, a missing `//`, bad host characters.
    fn is_http_url(value: &str) -> bool {
        if value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '\\')
        {
            return false;
        }

        let Some((scheme, rest)) = value.split_once("://") else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return false;
        }

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority_ok = Regex::new(AUTHORITY_PATTERN).is_ok_and(|re| re.is_match(authority));

        authority_ok && Url::parse(value).is_ok_and(|url| url.host_str().is_some_and(|h| !h.is_empty()))
    }
}
