use std::fmt;

/// The Gemini API key as held in memory.
///
/// Formatting never shows the key: `Debug` prints `SecretString([REDACTED])`
/// and `Display` prints `[REDACTED]`. The raw value is only reachable
/// through `unsecure()`, which `GeminiProvider` calls when it builds the
/// request URL. `masked()` gives a short fingerprint for confirmations.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

/// Keys shorter than this are fully masked
const MIN_LEN_FOR_SUFFIX: usize = 12;

impl SecretString {
    /// Wrap a key, dropping surrounding whitespace from copy-paste
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.len() == key.len() {
            Self(key)
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn unsecure(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `****` followed by the last four characters, e.g. `****x9Qk`.
    /// Short keys print as `****` only.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() < MIN_LEN_FOR_SUFFIX {
            return "****".to_string();
        }
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", suffix)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for SecretString {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}
