use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::CompletionEndpoint;
use crate::report::tools::ToolProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Completion endpoint. Production: `LlmClient` against the configured base URL.
    pub llm: Arc<dyn CompletionEndpoint>,
    /// Tools offered to the report model. Production: `ToolRegistry::career_tools`.
    pub tools: Arc<dyn ToolProvider>,
    pub config: Config,
}
