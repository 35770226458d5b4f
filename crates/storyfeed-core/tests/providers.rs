//! Wire-level tests for the AI providers and the gateway cascade.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storyfeed_core::ai::providers::{ClaudeApiProvider, GeminiApiProvider, OpenAiProvider};
use storyfeed_core::ai::{AiGateway, AiProvider};

fn claude_reply(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}]
    })
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

#[tokio::test]
async fn claude_sends_messages_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-test", "max_tokens": 64})))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply("Hello from Claude")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ClaudeApiProvider::with_base_url("test-key", "claude-test", &server.uri()).unwrap();
    let reply = provider.complete("Say hello", 64).await.unwrap();
    assert_eq!(reply, "Hello from Claude");
}

#[tokio::test]
async fn claude_error_payload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let provider = ClaudeApiProvider::with_base_url("k", "m", &server.uri()).unwrap();
    let err = provider.complete("hi", 10).await.unwrap_err();
    assert!(err.to_string().contains("Overloaded"), "got {err}");
}

#[tokio::test]
async fn claude_empty_content_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&server)
        .await;

    let provider = ClaudeApiProvider::with_base_url("k", "m", &server.uri()).unwrap();
    assert!(provider.complete("hi", 10).await.is_err());
}

#[tokio::test]
async fn gemini_sends_generate_content_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 32}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Hi from Gemini")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiApiProvider::with_base_url("g-key", "gemini-test", &server.uri()).unwrap();
    assert_eq!(provider.complete("hello", 32).await.unwrap(), "Hi from Gemini");
}

#[tokio::test]
async fn gemini_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({})))
        .mount(&server)
        .await;

    let provider = GeminiApiProvider::with_base_url("k", "m", &server.uri()).unwrap();
    assert!(provider.complete("hello", 32).await.is_err());
}

#[tokio::test]
async fn openai_reads_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-test"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-test",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi from OpenAI"},
                "finish_reason": "stop",
                "logprobs": null
            }]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test", "gpt-test", Some(&server.uri()));
    assert_eq!(provider.complete("hello", 16).await.unwrap(), "Hi from OpenAI");
}

#[tokio::test]
async fn gateway_falls_back_across_real_providers() {
    let claude = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "boom"}})))
        .expect(1)
        .mount(&claude)
        .await;

    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("```json\n{\"ok\": true}\n```")))
        .expect(1)
        .mount(&gemini)
        .await;

    let providers: Vec<Arc<dyn AiProvider>> = vec![
        Arc::new(ClaudeApiProvider::with_base_url("k", "m", &claude.uri()).unwrap()),
        Arc::new(GeminiApiProvider::with_base_url("k", "m", &gemini.uri()).unwrap()),
    ];
    let gateway = AiGateway::new(providers, Duration::from_secs(5), 100);

    let reply = gateway.analyze("prompt", 50).await.unwrap();
    assert_eq!(storyfeed_core::ai::extract_json_span(&reply), Some("{\"ok\": true}"));
}

#[tokio::test]
async fn gateway_times_out_slow_provider() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(claude_reply("too late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&slow)
        .await;

    let providers: Vec<Arc<dyn AiProvider>> =
        vec![Arc::new(ClaudeApiProvider::with_base_url("k", "m", &slow.uri()).unwrap())];
    let gateway = AiGateway::new(providers, Duration::from_millis(300), 100);

    let started = std::time::Instant::now();
    assert!(gateway.analyze("prompt", 50).await.is_none());
    assert!(started.elapsed() < Duration::from_secs(3));
}
