use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::Value;

use crate::client::InferenceClient;
use crate::{RelayError, Result};

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Raw image bytes plus the content type they should be served with.
#[derive(Debug, Clone)]
pub struct ImageBytes {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Locates the image reference in a result payload and materializes it.
///
/// Result shapes vary across models and were learned empirically, so the
/// priority order matters and must not be reordered:
/// top-level `url`, then the first element of `output`/`outputs`/`results`
/// (object `url`, object `base64`/`b64`, or a bare http string), then a
/// depth-first search of the whole payload for the first http-prefixed
/// string.
pub async fn extract_image(client: &InferenceClient, payload: &Value) -> Result<ImageBytes> {
    if let Some(url) = nonempty_str(payload.get("url")) {
        return fetch(client, url).await;
    }

    if let Some(item) = output_list(payload).and_then(|items| items.first()) {
        match item {
            Value::Object(_) => {
                if let Some(url) = nonempty_str(item.get("url")) {
                    return fetch(client, url).await;
                }
                if let Some(data) = nonempty_str(item.get("base64")).or(nonempty_str(item.get("b64")))
                {
                    return decode_base64(data);
                }
            }
            Value::String(s) if s.starts_with("http") => {
                return fetch(client, s).await;
            }
            _ => {}
        }
    }

    if let Some(url) = first_http_url(payload) {
        return fetch(client, url).await;
    }

    Err(RelayError::NoImageFound {
        payload: payload.clone(),
    })
}

/// Depth-first search for the first string value starting with an http
/// scheme prefix. JSON trees are acyclic, so plain recursion terminates.
pub fn first_http_url(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if s.starts_with("http") => Some(s.as_str()),
        Value::Object(map) => map.values().find_map(first_http_url),
        Value::Array(items) => items.iter().find_map(first_http_url),
        _ => None,
    }
}

fn output_list(payload: &Value) -> Option<&Vec<Value>> {
    ["output", "outputs", "results"]
        .iter()
        .find_map(|key| {
            payload
                .get(*key)
                .filter(|v| !v.is_null() && !matches!(v, Value::Array(a) if a.is_empty()))
        })
        .and_then(Value::as_array)
}

fn nonempty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

async fn fetch(client: &InferenceClient, url: &str) -> Result<ImageBytes> {
    let (bytes, content_type) = client.fetch_bytes(url).await?;
    Ok(ImageBytes {
        bytes,
        content_type: content_type.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
    })
}

fn decode_base64(data: &str) -> Result<ImageBytes> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|err| RelayError::MalformedResponse {
            detail: format!("invalid base64 image data: {err}"),
            payload: Value::Null,
        })?;
    // The inline-base64 shape carries no media type at all.
    Ok(ImageBytes {
        bytes: Bytes::from(bytes),
        content_type: DEFAULT_IMAGE_MIME.to_string(),
    })
}
