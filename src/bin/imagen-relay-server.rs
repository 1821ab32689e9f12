use imagen_relay::{AppState, Env, RelayConfig, router};

fn init_tracing(json_logs: bool) {
    use tracing_subscriber::Layer as _;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut listen = "0.0.0.0:8080".to_string();
    let mut base_url: Option<String> = None;
    let mut model: Option<String> = None;
    let mut poll_interval: Option<String> = None;
    let mut poll_timeout: Option<String> = None;
    let mut json_logs = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" | "--addr" => {
                listen = args.next().ok_or("missing value for --listen/--addr")?;
            }
            "--base-url" => {
                base_url = Some(args.next().ok_or("missing value for --base-url")?);
            }
            "--model" => {
                model = Some(args.next().ok_or("missing value for --model")?);
            }
            "--poll-interval" => {
                poll_interval = Some(args.next().ok_or("missing value for --poll-interval")?);
            }
            "--poll-timeout" => {
                poll_timeout = Some(args.next().ok_or("missing value for --poll-timeout")?);
            }
            "--json-logs" => json_logs = true,
            other => {
                return Err(format!(
                    "unknown argument: {other}\nusage: imagen-relay-server [--listen HOST:PORT] [--base-url URL] [--model ID] [--poll-interval SECS] [--poll-timeout SECS] [--json-logs]"
                )
                .into());
            }
        }
    }

    init_tracing(json_logs);

    let env = match std::fs::read_to_string(".env") {
        Ok(contents) => Env::parse_dotenv(&contents),
        Err(_) => Env::default(),
    };
    let mut dotenv = env.dotenv.clone();
    if let Some(base_url) = base_url {
        dotenv.insert("INFERENCE_BASE_URL".to_string(), base_url);
    }
    if let Some(model) = model {
        dotenv.insert("DEFAULT_MODEL_ID".to_string(), model);
    }
    if let Some(interval) = poll_interval {
        dotenv.insert("POLL_INTERVAL".to_string(), interval);
    }
    if let Some(timeout) = poll_timeout {
        dotenv.insert("POLL_TIMEOUT".to_string(), timeout);
    }
    let config = RelayConfig::from_env(&Env { dotenv });

    if config.api_key.is_none() {
        tracing::warn!("DO_MODEL_ACCESS_KEY is not set; /generate will return 500 until it is");
    }

    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("imagen-relay listening on {listen}");
    axum::serve(listener, app).await?;
    Ok(())
}
