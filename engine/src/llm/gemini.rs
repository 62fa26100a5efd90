use super::{LLMError, LLMProvider};
use crate::config::GeminiConfig;
use crate::secrets::{scrub_secrets, SecretCache, GEMINI_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Body markers Gemini uses for capacity errors that don't always arrive
/// as HTTP 429.
const RATE_LIMIT_MARKERS: [&str; 4] = [
    "resource_exhausted",
    "quota",
    "rate limit",
    "too many requests",
];

pub struct GeminiProvider {
    config: GeminiConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, secret_cache: Arc<SecretCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            config,
            secret_cache,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

fn looks_rate_limited(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Map a non-success HTTP status and body onto the remote error taxonomy.
fn classify_failure(status: u16, body: &str) -> LLMError {
    let body = scrub_secrets(body);
    match status {
        429 => LLMError::RateLimitExceeded(body),
        _ if looks_rate_limited(&body) => LLMError::RateLimitExceeded(body),
        401 | 403 => LLMError::AuthenticationFailed(body),
        400 | 404 => LLMError::InvalidRequest(body),
        _ => LLMError::ProviderUnavailable(format!("Gemini API error ({}): {}", status, body)),
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn check_health(&self) -> bool {
        self.secret_cache.get_secret(GEMINI_API_KEY).is_ok()
    }

    async fn complete(&self, prompt: &str) -> super::Result<String> {
        let api_key = self
            .secret_cache
            .get_secret(GEMINI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            api_key.unsecure()
        );

        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(scrub_secrets(&e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(scrub_secrets(&e.to_string())))?;

        let parts = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No candidate content in response".to_string()))?;

        let full_text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();

        if full_text.trim().is_empty() {
            return Err(LLMError::ParseError("Empty response text".to_string()));
        }

        tracing::debug!(
            model = %self.config.model,
            chars = full_text.len(),
            "Gemini response received"
        );

        Ok(full_text)
    }
}
