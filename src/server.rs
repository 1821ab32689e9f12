use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;

use crate::client::InferenceClient;
use crate::config::RelayConfig;
use crate::extract::{ImageBytes, extract_image};
use crate::poll::poll_until_done;
use crate::{RelayError, Result};

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    client: InferenceClient,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let client = InferenceClient::from_config(&config);
        Self {
            config: Arc::new(config),
            client,
        }
    }

}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
}

/// One request walks the whole chain synchronously: validate, submit,
/// poll to a terminal state, extract, respond. Every failure is mapped to
/// an HTTP response here; nothing propagates past this boundary.
async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    match run_generation(&state, &body).await {
        Ok(image) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, image.content_type)],
            image.bytes,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn run_generation(state: &AppState, body: &[u8]) -> Result<ImageBytes> {
    if state
        .config
        .api_key
        .as_deref()
        .is_none_or(|key| key.trim().is_empty())
    {
        return Err(RelayError::Config(
            "DO_MODEL_ACCESS_KEY is not set".to_string(),
        ));
    }

    let request: GenerateRequest = serde_json::from_slice(body)
        .map_err(|_| RelayError::Validation("request body must be a JSON object".to_string()))?;
    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RelayError::Validation("prompt is required".to_string()))?;
    let model_id = request
        .model_id
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&state.config.default_model);

    let request_id = state
        .client
        .submit(model_id, serde_json::json!({ "prompt": prompt }))
        .await?;
    tracing::info!(request_id = %request_id, model_id, "generation job submitted");

    let result = poll_until_done(
        &state.client,
        &request_id,
        state.config.poll_interval,
        state.config.poll_timeout,
    )
    .await?;
    let image = extract_image(&state.client, &result).await?;
    tracing::info!(
        request_id = %request_id,
        content_type = %image.content_type,
        bytes = image.bytes.len() as u64,
        "image ready"
    );
    Ok(image)
}

fn error_response(err: RelayError) -> Response {
    tracing::warn!(error = %err, "generation request failed");
    match err {
        RelayError::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        RelayError::Config(message) => {
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
        RelayError::PollTimeout { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, format!("Timed out: {err}")).into_response()
        }
        RelayError::Api { .. } | RelayError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            format!("HTTP error during inference: {err}"),
        )
            .into_response(),
        RelayError::MalformedResponse { detail, payload } => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": detail, "resp": payload })),
        )
            .into_response(),
        RelayError::JobFailed { details } => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": "job failed", "details": details })),
        )
            .into_response(),
        RelayError::NoImageFound { payload } => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": "no image found in result", "result": payload })),
        )
            .into_response(),
        RelayError::Json(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}")).into_response()
        }
    }
}
