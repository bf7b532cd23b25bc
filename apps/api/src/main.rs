mod config;
mod eligibility;
mod errors;
mod llm_client;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::eligibility::policies::StaticPolicyProvider;
use crate::eligibility::EligibilityEngine;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Eligibility API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let retry = config.retry_policy();
    info!(
        "LLM retry policy: max_retries={}, base_delay={:?}, worst-case backoff={:?}",
        retry.max_retries,
        retry.base_delay,
        retry.total_backoff(true)
    );
    let engine = EligibilityEngine::new(Arc::new(llm), retry);

    // Load default lender policies
    let policies = match &config.lender_policies_path {
        Some(path) => StaticPolicyProvider::from_file(path)
            .with_context(|| format!("Failed to load LENDER_POLICIES_PATH={path}"))?,
        None => StaticPolicyProvider::default(),
    };
    if policies.is_empty() {
        warn!("No default lender policies configured; requests must supply their own");
    } else {
        info!("Loaded {} lender policies", policies.len());
    }

    // Build app state
    let state = AppState {
        engine: Arc::new(engine),
        policies: Arc::new(policies),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
