use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://inference.do-ai.run/v1";
pub const DEFAULT_MODEL_ID: &str = "fal-ai/flux/schnell";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment lookup with an optional dotenv overlay. Dotenv entries win
/// over the process environment; blank values are treated as unset.
#[derive(Debug, Default, Clone)]
pub struct Env {
    pub dotenv: BTreeMap<String, String>,
}

impl Env {
    pub fn parse_dotenv(contents: &str) -> Self {
        Self {
            dotenv: parse_dotenv(contents),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.dotenv.get(key) {
            return Some(value.clone());
        }
        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

pub fn parse_dotenv(contents: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::<String, String>::new();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim();
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = raw_key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = raw_value.trim().to_string();
        if let Some(stripped) = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        {
            value = stripped.to_string();
        }
        if value.is_empty() {
            continue;
        }

        out.insert(key.to_string(), value);
    }

    out
}

/// Startup configuration, built once and passed by reference into the
/// components that need it. A missing credential is surfaced per-request,
/// not at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl RelayConfig {
    pub fn from_env(env: &Env) -> Self {
        let mut config = Self::default();
        config.api_key = env.get("DO_MODEL_ACCESS_KEY").filter(|k| !k.trim().is_empty());
        if let Some(base_url) = env.get("INFERENCE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = env.get("DEFAULT_MODEL_ID") {
            config.default_model = model;
        }
        if let Some(interval) = env.get("POLL_INTERVAL").and_then(|v| parse_secs(&v)) {
            config.poll_interval = interval;
        }
        if let Some(timeout) = env.get("POLL_TIMEOUT").and_then(|v| parse_secs(&v)) {
            config.poll_timeout = timeout;
        }
        config
    }
}

fn parse_secs(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(secs))
}
