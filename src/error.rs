use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("server configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Validation(String),
    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected provider response: {detail}")]
    MalformedResponse { detail: String, payload: Value },
    #[error("job failed: {details}")]
    JobFailed { details: Value },
    #[error("polling timed out after {elapsed_secs:.1}s")]
    PollTimeout { elapsed_secs: f64 },
    #[error("no image found in result")]
    NoImageFound { payload: Value },
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
