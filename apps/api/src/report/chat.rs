//! Follow-up chat grounded in a finished report.

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{CompletionEndpoint, CHAT_SAMPLING};
use crate::models::profile::StudentProfile;
use crate::models::report::ReportRow;
use crate::report::prompts::build_chat_messages;
use crate::report::store::{download_artifact, find_report};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: Uuid,
    pub report_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub async fn chat_about_report(
    state: &AppState,
    request: ChatRequest,
) -> Result<ChatResponse, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let report = find_report(&state.db, request.user_id, request.report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", request.report_id)))?;

    if !report.is_completed() {
        return Err(AppError::UnprocessableEntity(format!(
            "Report {} is {}, not completed",
            report.id, report.status
        )));
    }

    let extracted = match download_artifact(&state.s3, &state.config.s3_bucket, &report.s3_key).await
    {
        Ok(bytes) => extract_report_text(bytes).await,
        Err(e) => {
            warn!("Could not download {}: {e}", report.s3_key);
            None
        }
    };
    let grounding = grounding_text(extracted, &report)?;

    let reply = answer(state.llm.as_ref(), &grounding, &request.message).await?;
    info!(
        "Answered chat for report {} ({} chars)",
        report.id,
        reply.len()
    );
    Ok(ChatResponse { reply })
}

/// Single tool-free completion over the report text.
pub async fn answer(
    endpoint: &dyn CompletionEndpoint,
    report_text: &str,
    question: &str,
) -> Result<String, AppError> {
    let messages = build_chat_messages(report_text, question, Utc::now());
    let turn = endpoint
        .complete(&messages, &[], CHAT_SAMPLING)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    turn.text_content()
        .map(str::to_string)
        .ok_or_else(|| AppError::Llm("chat completion returned no text".to_string()))
}

/// Text of a stored PDF, extracted off the async executor. Any failure,
/// including a panic inside the extractor, yields `None`.
async fn extract_report_text(bytes: Bytes) -> Option<String> {
    match tokio::task::spawn_blocking(move || extract_text(&bytes)).await {
        Ok(text) => text,
        Err(e) => {
            warn!("PDF text extraction worker failed: {e}");
            None
        }
    }
}

fn extract_text(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            warn!("PDF text extraction failed: {e}");
            None
        }
    }
}

/// Extracted PDF text, or a summary of the stored profile when that is unavailable.
fn grounding_text(extracted: Option<String>, report: &ReportRow) -> Result<String, AppError> {
    if let Some(text) = extracted {
        return Ok(text);
    }

    let summary = serde_json::from_value::<StudentProfile>(report.report_data.clone())
        .map(|profile| profile.summary())
        .unwrap_or_default();

    if summary.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(format!(
            "No readable content for report {}",
            report.id
        )));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::llm_client::{AssistantTurn, ChatMessage, LlmError, SamplingParams, ToolDefinition};

    #[derive(Default)]
    struct RecordingEndpoint {
        seen: Mutex<Vec<(usize, usize, u32)>>,
    }

    #[async_trait]
    impl CompletionEndpoint for RecordingEndpoint {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
            params: SamplingParams,
        ) -> Result<AssistantTurn, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.len(), tools.len(), params.max_tokens));
            Ok(AssistantTurn {
                content: Some("Focus on JEE Advanced.".to_string()),
                tool_calls: Vec::new(),
            })
        }
    }

    fn row(report_data: serde_json::Value) -> ReportRow {
        ReportRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_name: "report.pdf".to_string(),
            s3_key: "reports/report.pdf".to_string(),
            file_size: Some(1024),
            status: "completed".to_string(),
            error_message: None,
            report_data,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_answer_uses_chat_sampling_without_tools() {
        let endpoint = RecordingEndpoint::default();
        let reply = answer(&endpoint, "## Summary\nEngineering.", "Which exam?")
            .await
            .unwrap();

        assert_eq!(reply, "Focus on JEE Advanced.");
        assert_eq!(*endpoint.seen.lock().unwrap(), vec![(2, 0, 500)]);
    }

    #[test]
    fn test_grounding_prefers_extracted_text() {
        let report = row(json!({}));
        let text = grounding_text(Some("Career report".to_string()), &report).unwrap();
        assert_eq!(text, "Career report");
    }

    #[test]
    fn test_grounding_falls_back_to_profile_summary() {
        let report = row(json!({
            "name": "Asha",
            "skills": ["Math"],
            "interests": ["Technology"],
            "goals": "Robotics",
            "preferred_fields": ["Engineering"]
        }));
        let text = grounding_text(None, &report).unwrap();
        assert!(text.contains("Student Name: Asha"));
    }

    #[tokio::test]
    async fn test_unreadable_pdf_yields_none() {
        assert!(extract_report_text(Bytes::from_static(b"not a pdf")).await.is_none());
        assert!(extract_report_text(Bytes::from_static(b"%PDF-1.5\n%%EOF")).await.is_none());
    }

    #[tokio::test]
    async fn test_extracts_text_from_rendered_report() {
        let profile = StudentProfile {
            name: "Asha".to_string(),
            ..Default::default()
        };
        let artifact = crate::report::assembly::assemble(
            &profile,
            Uuid::new_v4(),
            "## Summary\nEngineering suits Asha.",
            Utc::now(),
        )
        .unwrap();

        let text = extract_report_text(artifact.bytes).await.unwrap();
        assert!(text.contains("Summary"));
    }
}
