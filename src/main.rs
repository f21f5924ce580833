use bedrock_relay::config::config_search_paths;
use bedrock_relay::upstream::bedrock::default_credentials_provider;
use bedrock_relay::{build_router, AppState, BedrockClient, RelayConfig, SharedExchangeLog};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "bedrock-relay",
    about = "OpenAI and Anthropic compatible relay in front of Amazon Bedrock Claude models",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT and config)
    #[arg(short, long)]
    port: Option<u16>,

    /// AWS region of the Bedrock runtime (overrides REGION and config)
    #[arg(long)]
    region: Option<String>,

    /// Bedrock runtime base URL, replacing the regional endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Exchange log file path
    #[arg(long, default_value = "bedrock-relay.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bedrock_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(region) = cli.region {
        config.region = Some(region);
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(timeout) = cli.timeout_secs {
        config.timeout_secs = timeout;
    }

    let exchanges = SharedExchangeLog::open(&cli.log_file)?;
    // drop records that no longer fit the ring buffer
    exchanges.compact()?;

    info!("bedrock-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Region:    {}", config.region.as_deref().unwrap_or("<unset>"));
    if let Some(ref endpoint) = config.endpoint {
        info!("  Endpoint:  {}", endpoint);
    }
    info!("  Default:   {}", config.default_model);
    info!("  Timeout:   {}s", config.timeout_secs);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    if config.region.is_none() {
        warn!("REGION is not set; every invocation will fail with 500 until it is");
    }

    let credentials = default_credentials_provider(config.region.as_deref()).await;
    if credentials.is_none() {
        warn!("No AWS credentials provider available; every invocation will fail with 500");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let state = Arc::new(AppState {
        invoker: Arc::new(BedrockClient::new(client, &config, credentials)),
        config: config.clone(),
        exchanges,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server is running on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
