//! Remote Model Abstraction Layer
//!
//! The plan pipeline treats the generative model as an opaque function
//! `complete(prompt) -> text`. The `LLMProvider` trait is that seam: the
//! Gemini provider implements it for production, tests implement it with
//! scripted responses.

use async_trait::async_trait;
use sdk::errors::FitErrorExt;

pub mod gemini;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during a remote model call
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl LLMError {
    /// Only capacity failures (rate limit, quota, too many requests) are
    /// worth another attempt; everything else propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
    }
}

impl FitErrorExt for LLMError {
    fn user_hint(&self) -> &str {
        match self {
            Self::RateLimitExceeded(_) => "The AI service is busy. Try again in a minute",
            Self::AuthenticationFailed(_) => "Check the Gemini API key",
            Self::InvalidRequest(_) => "The request was rejected. Check the configured model name",
            Self::ProviderUnavailable(_) => "The AI service is unavailable right now",
            Self::NetworkError(_) | Self::Timeout => "Check your network connection",
            Self::ParseError(_) => "The AI service returned an unexpected response",
            Self::Cancelled => "The operation was cancelled",
            Self::Unknown(_) => "An unexpected error occurred",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded(_)
                | Self::ProviderUnavailable(_)
                | Self::NetworkError(_)
                | Self::Timeout
        )
    }
}

/// LLM Provider trait that all remote models must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini")
    fn name(&self) -> &str;

    /// Send one prompt and return the raw response text
    ///
    /// # Returns
    /// * `Ok(String)` - The concatenated text of the model's answer
    /// * `Err(LLMError)` - If the request fails
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is currently usable.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Body of the first markdown code fence in the text.
///
/// A language tag on the opening line (e.g. "json") is skipped; a fence
/// without one works too. Trailing prose after the closing ``` is ignored.
pub fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    let body_start_rel = match after_opening.find('\n') {
        Some(newline) => {
            let tag = after_opening[..newline].trim();
            if tag.is_empty() || tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                newline + 1
            } else {
                0
            }
        }
        None => 0,
    };
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    let body = content[body_start..body_end].trim();
    // Single-line fences: ```json {...}```
    let body = body.strip_prefix("json").map(str::trim_start).unwrap_or(body);
    if body.is_empty() {
        return None;
    }

    Some(body)
}

/// The first balanced JSON object anywhere in `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
pub fn extract_balanced_json(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let s = &s[start..];
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(LLMError::RateLimitExceeded("429".into()).is_retryable());
        assert!(!LLMError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!LLMError::InvalidRequest("bad".into()).is_retryable());
        assert!(!LLMError::NetworkError("reset".into()).is_retryable());
        assert!(!LLMError::Timeout.is_retryable());
        assert!(!LLMError::Cancelled.is_retryable());
    }

    #[test]
    fn test_auth_failure_is_not_recoverable() {
        let err = LLMError::AuthenticationFailed("403".into());
        assert!(!err.is_recoverable());
        assert!(err.user_hint().contains("API key"));
        assert!(LLMError::RateLimitExceeded("quota".into()).is_recoverable());
    }

    #[test]
    fn test_extract_fenced_with_tag() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(extract_fenced_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_fenced_without_tag() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_fenced_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_fenced_single_line() {
        let text = "```json {\"a\": 1}```";
        assert_eq!(extract_fenced_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_fenced_none() {
        assert_eq!(extract_fenced_json("{\"a\": 1}"), None);
        assert_eq!(extract_fenced_json("```json\n```"), None);
    }

    #[test]
    fn test_extract_balanced_in_prose() {
        let text = r#"Segment: {"segment": "x", "nested": {"b": "}"}} trailing"#;
        assert_eq!(
            extract_balanced_json(text),
            Some(r#"{"segment": "x", "nested": {"b": "}"}}"#)
        );
    }

    #[test]
    fn test_extract_balanced_unterminated() {
        assert_eq!(extract_balanced_json("{\"a\": 1"), None);
        assert_eq!(extract_balanced_json("no json here"), None);
    }
}
