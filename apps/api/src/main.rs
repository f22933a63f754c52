mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod render;
mod report;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::report::tools::ToolRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.rust_log);

    info!("Starting Counsel API v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(config.clone()).await?;
    let app = routes::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// `RUST_LOG` wins when set; otherwise only this crate logs, at the configured level.
fn init_tracing(level: &str) {
    let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{crate_target}={level}"))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn build_state(config: Config) -> Result<AppState> {
    let db = db::create_pool(&config.database_url).await?;

    let s3 = build_s3_client(&config).await;
    info!("S3 client ready (bucket: {})", config.s3_bucket);

    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
    )?;
    info!("Completion endpoint: {} ({})", config.llm_base_url, llm.model());

    let tools = ToolRegistry::career_tools(reqwest::Client::new(), &config.nirf_base_url);
    info!(
        "Report limits: {} rounds, tool rounds {:?}, timeout {:?}",
        config.report.max_iterations, config.report.max_tool_rounds, config.report.timeout
    );

    Ok(AppState {
        db,
        s3,
        llm: Arc::new(llm),
        tools: Arc::new(tools),
        config,
    })
}

/// S3 client for MinIO (local) or AWS. Path-style addressing keeps MinIO happy.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "counsel-static",
    );

    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
