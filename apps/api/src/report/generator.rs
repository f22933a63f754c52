//! Report generation pipeline: prompt → agentic loop → assembly → storage.
//!
//! `produce_report` is the pure core and knows nothing about persistence.
//! `generate_report` wraps it with the all-or-nothing storage contract: exactly
//! one `completed` record on success, one `failed` record on any fatal error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ReportLimits;
use crate::llm_client::CompletionEndpoint;
use crate::models::profile::StudentProfile;
use crate::render::RenderError;
use crate::report::agent_loop::{self, LoopBudget};
use crate::report::assembly::{assemble, ReportArtifact};
use crate::report::error::ReportError;
use crate::report::prompts::build_report_messages;
use crate::report::store::{store_completed, store_failed};
use crate::report::tools::ToolProvider;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportRequest {
    pub user_id: Uuid,
    pub profile: StudentProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReportResponse {
    pub report_id: Uuid,
    pub file_name: String,
    pub s3_key: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

/// Runs the loop under the configured timeout, then renders the body.
///
/// Dropping the returned future abandons the request at its next await point.
pub async fn produce_report(
    endpoint: &dyn CompletionEndpoint,
    tools: &dyn ToolProvider,
    limits: &ReportLimits,
    owner_id: Uuid,
    profile: &StudentProfile,
) -> Result<ReportArtifact, ReportError> {
    let messages = build_report_messages(profile);

    let outcome = tokio::time::timeout(
        limits.timeout,
        agent_loop::run(endpoint, tools, messages, LoopBudget::from(limits)),
    )
    .await
    .map_err(|_| ReportError::TimedOut {
        secs: limits.timeout.as_secs(),
    })??;
    info!(
        "Report body ready for user {owner_id}: {} round(s), {} tool round(s), {} message(s)",
        outcome.iterations,
        outcome.tool_rounds,
        outcome.conversation.len()
    );

    let profile = profile.clone();
    let generated_at = Utc::now();
    let artifact = tokio::task::spawn_blocking(move || {
        assemble(&profile, owner_id, &outcome.body, generated_at)
    })
    .await
    .map_err(|e| RenderError::Worker(e.to_string()))??;

    info!(
        "Assembled {} ({} bytes) for user {owner_id}",
        artifact.file_name, artifact.size
    );
    Ok(artifact)
}

/// Generates and stores a report. On failure a `failed` record is written
/// before the error is returned.
pub async fn generate_report(
    state: &AppState,
    request: GenerateReportRequest,
) -> Result<GenerateReportResponse, ReportError> {
    let GenerateReportRequest { user_id, profile } = request;
    info!("Generating career report for user {user_id}");

    let result = async {
        let artifact = produce_report(
            state.llm.as_ref(),
            state.tools.as_ref(),
            &state.config.report,
            user_id,
            &profile,
        )
        .await?;
        store_completed(
            &state.db,
            &state.s3,
            &state.config.s3_bucket,
            user_id,
            &profile,
            artifact,
        )
        .await
    }
    .await;

    match result {
        Ok(stored) => {
            info!("Report {} completed for user {user_id}", stored.report_id);
            Ok(GenerateReportResponse {
                report_id: stored.report_id,
                file_name: stored.file_name,
                s3_key: stored.s3_key,
                file_size: stored.file_size,
                created_at: stored.created_at,
            })
        }
        Err(e) => {
            error!("Report generation failed for user {user_id} [{}]: {e}", e.code());
            if let Err(db_err) = store_failed(&state.db, user_id, &profile, &e.status_message()).await {
                error!("Could not record failed report for user {user_id}: {db_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::llm_client::{
        AssistantTurn, ChatMessage, LlmError, SamplingParams, ToolCallRequest, ToolDefinition,
    };

    fn profile() -> StudentProfile {
        StudentProfile {
            name: "Asha".to_string(),
            skills: vec!["Math".to_string()],
            interests: vec!["Technology".to_string()],
            preferred_fields: vec!["Engineering".to_string()],
            goals: "Robotics".to_string(),
            ..Default::default()
        }
    }

    fn limits(max_iterations: u32, timeout: Duration) -> ReportLimits {
        ReportLimits {
            max_iterations,
            max_tool_rounds: None,
            timeout,
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolProvider for NoTools {
        fn catalog(&self) -> Vec<ToolDefinition> {
            Vec::new()
        }

        async fn invoke(&self, name: &str, _arguments: &str) -> String {
            format!("Error executing {name}: no tools")
        }
    }

    /// Writes a fixed report body on the first round.
    struct FixedReport(&'static str);

    #[async_trait]
    impl CompletionEndpoint for FixedReport {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _params: SamplingParams,
        ) -> Result<AssistantTurn, LlmError> {
            Ok(AssistantTurn {
                content: Some(self.0.to_string()),
                tool_calls: Vec::new(),
            })
        }
    }

    /// Requests a tool on every round and counts how often it was asked.
    #[derive(Default)]
    struct EndlessTools {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionEndpoint for EndlessTools {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _params: SamplingParams,
        ) -> Result<AssistantTurn, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AssistantTurn {
                content: None,
                tool_calls: vec![ToolCallRequest {
                    id: format!("call_{n}"),
                    name: "get_market_trends".to_string(),
                    arguments: "{}".to_string(),
                }],
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl CompletionEndpoint for Stalled {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _params: SamplingParams,
        ) -> Result<AssistantTurn, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AssistantTurn::default())
        }
    }

    #[tokio::test]
    async fn test_produce_report_renders_artifact() {
        let endpoint = FixedReport("## Summary\n- Point one\nPlain text.");
        let owner = Uuid::new_v4();
        let artifact = produce_report(
            &endpoint,
            &NoTools,
            &limits(3, Duration::from_secs(5)),
            owner,
            &profile(),
        )
        .await
        .unwrap();

        assert!(artifact.bytes.starts_with(b"%PDF"));
        assert_eq!(artifact.size, artifact.bytes.len());
        assert!(artifact.file_name.contains(&owner.simple().to_string()));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_produces_no_artifact() {
        let endpoint = EndlessTools::default();
        let err = produce_report(
            &endpoint,
            &NoTools,
            &limits(3, Duration::from_secs(5)),
            Uuid::new_v4(),
            &profile(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ReportError::IterationBudgetExhausted { iterations: 3 }
        ));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_model_output_is_fatal() {
        let err = produce_report(
            &FixedReport("   "),
            &NoTools,
            &limits(3, Duration::from_secs(5)),
            Uuid::new_v4(),
            &profile(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReportError::EmptyContent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_endpoint_times_out() {
        let err = produce_report(
            &Stalled,
            &NoTools,
            &limits(3, Duration::from_secs(30)),
            Uuid::new_v4(),
            &profile(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReportError::TimedOut { secs: 30 }));
    }
}
