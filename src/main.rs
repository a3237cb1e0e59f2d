use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use caseaid::channels::web::server::{GatewayState, start_server};
use caseaid::config::{GatewayConfig, LoggingConfig};
use caseaid::legal::assistant::CaseAssistant;
use caseaid::legal::case::CaseStore;
use caseaid::llm::{AiGateway, GeminiGateway};

/// Legal-aid case assistant gateway.
#[derive(Debug, Parser)]
#[command(name = "caseaid", version, about)]
struct Cli {
    /// Address to bind (overrides CASEAID_HOST).
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind (overrides CASEAID_PORT).
    #[arg(long, short)]
    port: Option<u16>,

    /// Start with an empty store instead of the demo case.
    #[arg(long)]
    no_demo: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("caseaid=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = GatewayConfig::resolve().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_demo {
        config.seed_demo = false;
    }

    init_tracing(&config.logging);

    let gateway: Option<Arc<dyn AiGateway>> = match config.gemini.take() {
        Some(gemini) => {
            tracing::info!(model = %gemini.model, "Gemini gateway configured");
            Some(Arc::new(GeminiGateway::new(gemini)))
        }
        None => {
            tracing::warn!("GOOGLE_API_KEY not set; AI replies will use fallback text");
            None
        }
    };

    let store = if config.seed_demo {
        CaseStore::with_demo_case()
    } else {
        CaseStore::new()
    };
    let state = Arc::new(GatewayState::new(CaseAssistant::new(
        Arc::new(store),
        gateway,
    )));

    let addr = start_server(config.bind_addr(), state.clone(), &config.cors_origins).await?;
    tracing::info!(%addr, "Case gateway listening");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    state.shutdown().await;

    Ok(())
}
