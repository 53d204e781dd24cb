//! Token masking for safe logging
//!
//! The ThreadFix api key is held as a `secrecy::SecretString`. Before it can
//! appear in a log line or diagnostic it goes through [`TokenMasker`].

use regex::{NoExpand, Regex};
use secrecy::{ExposeSecret, SecretString};

/// Masks api tokens in log lines and uploader output
///
/// # Examples
///
/// ```
/// use threadfix_publisher::TokenMasker;
/// use secrecy::SecretString;
///
/// let masker = TokenMasker::new(&SecretString::new("abcdef123456".into()));
/// assert_eq!(masker.masked_token(), "abc...456");
/// assert_eq!(masker.mask_tokens_in_string("key=abcdef123456"), "key=abc...456");
/// ```
pub struct TokenMasker {
    token: SecretString,
}

/// Tokens shorter than this are never shown, even partially
const MIN_PARTIAL_LEN: usize = 10;

impl TokenMasker {
    pub fn new(token: &SecretString) -> Self {
        Self {
            token: SecretString::new(token.expose_secret().into()),
        }
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use threadfix_publisher::TokenMasker;
    ///
    /// assert_eq!(TokenMasker::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(TokenMasker::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < MIN_PARTIAL_LEN {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// The held token, masked
    pub fn masked_token(&self) -> String {
        Self::mask_token(self.token.expose_secret())
    }

    /// Replaces every occurrence of the held token in `text`
    ///
    /// Tokens shorter than 10 characters are not searched for.
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let token = self.token.expose_secret();
        if token.chars().count() < MIN_PARTIAL_LEN {
            return text.to_string();
        }

        let masked = Self::mask_token(token);
        match Regex::new(&regex::escape(token)) {
            Ok(regex) => regex.replace_all(text, NoExpand(&masked)).into_owned(),
            Err(_) => text.replace(token, &masked),
        }
    }
}
