//! Integration tests for the Gemini provider
//!
//! Uses wiremock to stand in for the generateContent endpoint.

use fitplan_engine::cache::ResponseCache;
use fitplan_engine::config::GeminiConfig;
use fitplan_engine::llm::gemini::GeminiProvider;
use fitplan_engine::llm::{LLMError, LLMProvider};
use fitplan_engine::rate_limiter::ThrottleGate;
use fitplan_engine::retry::{RetryController, RetryPolicy};
use fitplan_engine::secrets::{SecretCache, SecretManager, GEMINI_API_KEY};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const MODEL: &str = "gemini-2.5-flash-lite";
const ENDPOINT: &str = "/models/gemini-2.5-flash-lite:generateContent";

fn provider_for(server: &MockServer) -> GeminiProvider {
    let secrets = Arc::new(SecretCache::new(Arc::new(SecretManager::new(
        "fitplan-test",
    ))));
    secrets.insert(GEMINI_API_KEY, "test-key-123");

    let config = GeminiConfig {
        base_url: server.uri(),
        model: MODEL.to_string(),
        request_timeout_secs: 10,
    };
    GeminiProvider::new(config, secrets)
}

fn text_response(parts: &[&str]) -> serde_json::Value {
    let parts: Vec<_> = parts.iter().map(|t| json!({ "text": t })).collect();
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn test_complete_sends_single_user_part() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", "test-key-123"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Ahoj" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["# Plán", " na týždeň"])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let text = provider.complete("Ahoj").await.expect("request should succeed");

    assert_eq!(text, "# Plán na týždeň");
    assert_eq!(provider.name(), "gemini");
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimitExceeded(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_resource_exhausted_body_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "status": "RESOURCE_EXHAUSTED", "message": "capacity" }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_403_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, LLMError::AuthenticationFailed(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_404_is_invalid_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, LLMError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_500_is_provider_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, LLMError::ProviderUnavailable(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_empty_candidate_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = provider_for(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_network_error_does_not_leak_key() {
    // Nothing listens on this port once the server is dropped
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let secrets = Arc::new(SecretCache::new(Arc::new(SecretManager::new(
        "fitplan-test",
    ))));
    secrets.insert(GEMINI_API_KEY, "test-key-123");
    let provider = GeminiProvider::new(
        GeminiConfig {
            base_url: uri,
            model: MODEL.to_string(),
            request_timeout_secs: 5,
        },
        secrets,
    );

    let err = provider.complete("x").await.unwrap_err();
    assert!(matches!(
        err,
        LLMError::NetworkError(_) | LLMError::Timeout
    ));
    assert!(!err.to_string().contains("test-key-123"));
}

#[tokio::test]
async fn test_retry_controller_recovers_from_429() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["ok"])))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(ResponseCache::default());
    let controller = RetryController::new(
        Arc::new(provider_for(&server)),
        Arc::new(ThrottleGate::new(Duration::ZERO)),
        cache.clone(),
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
        },
    );
    let cancel = CancellationToken::new();

    let report = controller
        .execute_with_report("hello", &cancel)
        .await
        .expect("second attempt should succeed");
    assert_eq!(report.text, "ok");
    assert_eq!(report.attempts.len(), 2);

    // Served from cache: the mocks' expect(1) would fail on a third request
    assert_eq!(controller.execute("hello", &cancel).await.unwrap(), "ok");
    assert_eq!(cache.len(), 1);
}
