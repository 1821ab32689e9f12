mod client;
mod config;
mod error;
mod extract;
mod poll;
mod server;
mod utils;

pub use client::InferenceClient;
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_MODEL_ID, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, Env,
    RelayConfig, parse_dotenv,
};
pub use error::{RelayError, Result};
pub use extract::{DEFAULT_IMAGE_MIME, ImageBytes, extract_image, first_http_url};
pub use poll::{JobState, classify_status, poll_until_done, status_label};
pub use server::{AppState, router};
