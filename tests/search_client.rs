//! Tavily client tests against a mocked search server.

use math_agent::error::SearchError;
use math_agent::search::{SearchBackend, SearchHit, TavilyClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, api_key: &str) -> TavilyClient {
    TavilyClient::new(&server.uri(), api_key, 3, Duration::from_secs(5))
}

#[tokio::test]
async fn test_results_are_mapped_to_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "api_key": "tvly-test",
            "query": "Fourier transform definition",
            "max_results": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "Fourier transform definition",
            "results": [
                {
                    "title": "Fourier transform",
                    "url": "https://en.wikipedia.org/wiki/Fourier_transform",
                    "content": "F(w) = integral of f(t)*exp(-i*w*t) dt",
                    "score": 0.98
                },
                {
                    "title": "Fourier analysis",
                    "url": "https://example.org/fourier",
                    "content": "Decomposing a function into frequencies."
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hits = client(&server, "tvly-test")
        .search("Fourier transform definition")
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(
        hits[0],
        SearchHit {
            title: "Fourier transform".into(),
            url: "https://en.wikipedia.org/wiki/Fourier_transform".into(),
            excerpt: "F(w) = integral of f(t)*exp(-i*w*t) dt".into(),
        }
    );
    assert_eq!(hits[1].title, "Fourier analysis");
}

#[tokio::test]
async fn test_empty_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let hits = client(&server, "tvly-test").search("nothing").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client(&server, "tvly-test").search("q").await.unwrap_err();
    assert_eq!(
        err,
        SearchError::Status {
            status: 500,
            body: "boom".into(),
        }
    );
}

#[tokio::test]
async fn test_missing_key_skips_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, "").search("q").await.unwrap_err();
    assert_eq!(err, SearchError::MissingApiKey);
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, "tvly-test").search("q").await.unwrap_err();
    assert!(matches!(err, SearchError::Decode(_)));
}
