use anyhow::Result;
use clap::Parser;
use grid_insight::config::AppConfig;
use grid_insight::server::{self, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grid-insight")]
#[command(about = "HTTP service answering questions about energy-demand and weather telemetry")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Missing configuration prevents startup; nothing fails lazily later.
    let config = AppConfig::from_env()?;
    let state = AppState { config: Arc::new(config) };

    let app = server::router(state);
    let addr = format!("{}:{}", args.host, args.port);
    info!("grid-insight listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
