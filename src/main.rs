use clap::Parser;
use qwen_gateway::config::config_search_paths;
use qwen_gateway::credentials::select_provider;
use qwen_gateway::{build_router, AppState, GatewayConfig, RequestLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "qwen-gateway",
    about = "Anthropic Messages gateway in front of an OpenAI-compatible Qwen endpoint",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// OAuth credential file (overrides config)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Use this bearer token instead of reading the credential file
    #[arg(long)]
    token: Option<String>,

    /// Exchange log file (JSONL)
    #[arg(long, default_value = "qwen-gateway.log")]
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
                .unwrap_or_else(|_| "qwen_gateway=info,tower_http=info".into()),
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

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env();

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(path) = cli.credentials {
        config.credentials_path = Some(path);
    }

    let credential_source = if cli.token.is_some() {
        "--token".to_string()
    } else {
        config.effective_credentials_path()?.display().to_string()
    };
    let provider = select_provider(cli.token, &config)?;
    let logger = RequestLogger::new(&cli.log_file)?;

    info!("qwen-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Credentials: {}", credential_source);
    info!("  Default endpoint: {}", config.default_endpoint);
    info!("  API key gate: {}", if config.api_key.is_some() { "on" } else { "off" });
    info!("  Log file: {}", cli.log_file.display());

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, provider)?.with_logger(logger));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  To use with an Anthropic client:");
    info!("    ANTHROPIC_BASE_URL=http://{} <client>", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
