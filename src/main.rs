use std::sync::Arc;

use axum::{routing::get, Json, Router};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use keygate::config::AppConfig;
use keygate::domain::api_key::{ApiKey, ApiKeyId, KeyStore};
use keygate::infrastructure::api_key::{InMemoryKeyStore, KeyGenerator};
use keygate::infrastructure::logging::init_logging;
use keygate::infrastructure::usage::InMemoryUsageSink;

/// Keygate - API key gateway middleware
#[derive(Parser)]
#[command(name = "keygate")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway with a demo inner router
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve().await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let store = Arc::new(InMemoryKeyStore::new());
    let generated = KeyGenerator::live().generate();
    let demo_key = ApiKey::new(
        ApiKeyId::new("demo")?,
        "demo-account",
        &generated.prefix,
        &generated.hash,
    )
    .with_rate_limit(config.gateway.default_rate_limit);
    store.create(demo_key).await?;

    info!("Seeded demo API key: {}", generated.key);

    let state = keygate::create_app_state(
        store,
        Arc::new(InMemoryUsageSink::new()),
        &config,
    );

    let protected = Router::new()
        .route("/v1/echo", get(echo))
        .route("/v1/time", get(time));

    let app = keygate::api::create_router(state, protected);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn echo() -> Json<serde_json::Value> {
    Json(json!({ "message": "hello from behind the gateway" }))
}

async fn time() -> Json<serde_json::Value> {
    Json(json!({ "now": chrono::Utc::now().to_rfc3339() }))
}
