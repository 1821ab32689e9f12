use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use httpmock::{Method::GET, Method::POST, MockServer};
use imagen_relay::{AppState, RelayConfig, router};
use serde_json::json;
use tower::util::ServiceExt;

fn test_config(server: &MockServer) -> RelayConfig {
    RelayConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.url("/v1"),
        poll_interval: Duration::from_millis(1),
        poll_timeout: Duration::from_secs(5),
        ..RelayConfig::default()
    }
}

fn generate_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn index_serves_the_embedded_page() {
    let server = MockServer::start_async().await;
    let app = router(AppState::new(test_config(&server)));

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"), "{content_type}");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("/generate"));
}

#[tokio::test]
async fn blank_prompt_is_rejected_without_provider_contact() {
    let server = MockServer::start_async().await;
    let provider = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200).json_body(json!({ "request_id": "x" }));
        })
        .await;
    let app = router(AppState::new(test_config(&server)));

    for body in [
        json!({ "prompt": "" }),
        json!({ "prompt": "   \n\t" }),
        json!({ "model_id": "fal-ai/fast-sdxl" }),
    ] {
        let response = app.clone().oneshot(generate_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // A body that is not JSON at all is also the client's fault.
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(provider.hits_async().await, 0);
}

#[tokio::test]
async fn missing_credential_is_a_server_configuration_error() {
    let server = MockServer::start_async().await;
    let provider = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200).json_body(json!({ "request_id": "x" }));
        })
        .await;
    let config = RelayConfig {
        api_key: None,
        ..test_config(&server)
    };
    let app = router(AppState::new(config));

    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("DO_MODEL_ACCESS_KEY"));
    assert_eq!(provider.hits_async().await, 0);
}

#[tokio::test]
async fn successful_job_round_trips_the_image_bytes() {
    let png_bytes: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/async-invoke")
                .header("authorization", "Bearer test-key")
                .body_includes("\"prompt\":\"a red circle\"")
                .body_includes("\"model_id\":\"fal-ai/flux/schnell\"");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "request_id": "job-1" }));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-1/status");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "SUCCESS" }));
        })
        .await;
    let result = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "output": [{ "url": server.url("/files/img.png") }] }));
        })
        .await;
    let image = server
        .mock_async(|when, then| {
            when.method(GET).path("/files/img.png");
            then.status(200)
                .header("content-type", "image/png")
                .body(png_bytes);
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), png_bytes);

    submit.assert_async().await;
    status.assert_async().await;
    result.assert_async().await;
    image.assert_async().await;
}

#[tokio::test]
async fn never_terminal_job_maps_to_gateway_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "request_id": "job-slow" }));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-slow/status");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "RUNNING" }));
        })
        .await;

    let config = RelayConfig {
        poll_timeout: Duration::ZERO,
        ..test_config(&server)
    };
    let app = router(AppState::new(config));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(status.hits_async().await, 1);
}

#[tokio::test]
async fn failed_job_maps_to_bad_gateway_with_provider_reason() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "request_id": "job-bad" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-bad/status");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "FAILED", "reason": "bad prompt" }));
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("bad prompt"));
}

#[tokio::test]
async fn result_without_image_maps_to_bad_gateway_with_diagnostic() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "request_id": "job-empty" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-empty/status");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "state": "COMPLETE" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-empty");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "output": [{ "seed": 7 }] }));
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let diagnostic: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(diagnostic["error"], json!("no image found in result"));
    assert_eq!(diagnostic["result"]["output"][0]["seed"], json!(7));
}

#[tokio::test]
async fn provider_http_error_maps_to_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(503).body("capacity");
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("HTTP error during inference"));
}

#[tokio::test]
async fn submit_reply_without_job_id_maps_to_bad_gateway_diagnostic() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/async-invoke");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "queued": true }));
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(json!({ "prompt": "a red circle" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let diagnostic: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(diagnostic["resp"]["queued"], json!(true));
}

#[tokio::test]
async fn explicit_model_id_overrides_the_configured_default() {
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/async-invoke")
                .body_includes("\"model_id\":\"fal-ai/fast-sdxl\"");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "request_id": "job-m" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-m/status");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "succeeded" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/async-invoke/job-m");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "url": server.url("/files/m.png") }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files/m.png");
            then.status(200)
                .header("content-type", "image/png")
                .body("m-bytes");
        })
        .await;

    let app = router(AppState::new(test_config(&server)));
    let response = app
        .oneshot(generate_request(
            json!({ "prompt": "hi", "model_id": "fal-ai/fast-sdxl" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    submit.assert_async().await;
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), b"m-bytes");
}
