//! HTTP-level tests for the Ollama search backend.

use hoai_inference::{AiSearchBackend, Error, OllamaSearchBackend};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> OllamaSearchBackend {
    OllamaSearchBackend::with_timeout(server.uri(), "test-model".to_string(), 5)
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "model": "test-model",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

#[tokio::test]
async fn test_search_parses_json_answer() {
    let server = MockServer::start().await;
    let answer = json!({
        "title": "Honorarzone III",
        "content": "<p>Durchschnittliche Planungsanforderungen.</p>",
        "sources": [
            { "uri": "https://www.gesetze-im-internet.de/hoai_2013/", "title": "HOAI" },
            { "uri": "", "title": "ohne Link" }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "stream": false,
            "format": "json"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(&answer.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server).search("Honorarzone III?").await.unwrap();
    assert_eq!(result.title, "Honorarzone III");
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].title, "HOAI");
}

#[tokio::test]
async fn test_search_sends_query_as_user_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let result = backend(&server).search("Was ist LP 3?").await.unwrap();
    assert_eq!(result.title, "Was ist LP 3?");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "Was ist LP 3?");
}

#[tokio::test]
async fn test_search_falls_back_for_prose() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_reply("Die Entwurfsplanung ist LP 3.")),
        )
        .mount(&server)
        .await;

    let result = backend(&server).search("LP 3").await.unwrap();
    assert_eq!(result.title, "LP 3");
    assert_eq!(result.content, "Die Entwurfsplanung ist LP 3.");
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn test_search_maps_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server).search("q").await.unwrap_err();
    match err {
        Error::Inference(msg) => {
            assert!(msg.contains("500"), "unexpected message: {}", msg);
            assert!(msg.contains("model not loaded"));
        }
        other => panic!("expected Inference error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_maps_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = backend(&server).search("q").await.unwrap_err();
    assert!(matches!(err, Error::Inference(ref msg) if msg.starts_with("Failed to parse response")));
}

#[tokio::test]
async fn test_search_maps_transport_failure() {
    // Port 1 is reserved and never has a listener.
    let backend =
        OllamaSearchBackend::with_timeout("http://127.0.0.1:1".to_string(), "m".to_string(), 2);

    let err = backend.search("q").await.unwrap_err();
    assert!(matches!(err, Error::Inference(ref msg) if msg.starts_with("Request failed")));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    assert!(backend(&server).health_check().await.unwrap());
}
