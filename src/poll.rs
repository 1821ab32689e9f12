use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::client::InferenceClient;
use crate::{RelayError, Result};

/// Normalized job state. Providers report terminal states under several
/// spellings; everything unrecognized counts as still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Succeeded,
    Failed,
    Pending,
}

pub fn classify_status(raw: &str) -> JobState {
    match raw.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" | "SUCCEEDED" | "COMPLETE" => JobState::Succeeded,
        "FAILED" | "ERROR" => JobState::Failed,
        _ => JobState::Pending,
    }
}

/// The status payload carries the state under either "status" or "state".
/// The provider contract is undocumented, so both are read and the union
/// is kept deliberately wide.
pub fn status_label(payload: &Value) -> &str {
    payload
        .get("status")
        .and_then(Value::as_str)
        .or_else(|| payload.get("state").and_then(Value::as_str))
        .unwrap_or("")
}

/// Polls the job at a fixed interval until it reaches a terminal state,
/// then fetches and returns the full result payload. The timeout is
/// checked after every non-terminal status reply, so an expired budget
/// never triggers another provider call.
pub async fn poll_until_done(
    client: &InferenceClient,
    request_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<Value> {
    let start = Instant::now();
    loop {
        let status_payload = client.status(request_id).await?;
        let label = status_label(&status_payload);
        match classify_status(label) {
            JobState::Succeeded => {
                tracing::debug!(request_id, status = label, "job reached terminal state");
                return client.result(request_id).await;
            }
            JobState::Failed => {
                return Err(RelayError::JobFailed {
                    details: status_payload,
                });
            }
            JobState::Pending => {}
        }
        let elapsed = start.elapsed();
        if elapsed > timeout {
            return Err(RelayError::PollTimeout {
                elapsed_secs: elapsed.as_secs_f64(),
            });
        }
        sleep(interval).await;
    }
}
