use thiserror::Error;

use crate::llm_client::LlmError;
use crate::render::RenderError;

/// Every way a report-generation request can fail. All variants are fatal to
/// the request; tool failures never appear here because they are fed back to
/// the model as text.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("iteration budget of {iterations} completion rounds exhausted while the model kept requesting tools")]
    IterationBudgetExhausted { iterations: u32 },

    #[error("the model finished without producing any report content")]
    EmptyContent,

    #[error("completion endpoint failed: {0}")]
    Completion(#[from] LlmError),

    #[error("report rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("report generation timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("artifact storage failed: {0}")]
    Storage(String),
}

impl ReportError {
    /// Short machine-readable code, also used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::IterationBudgetExhausted { .. } => "ITERATION_BUDGET_EXHAUSTED",
            ReportError::EmptyContent => "EMPTY_REPORT_CONTENT",
            ReportError::Completion(_) => "COMPLETION_ENDPOINT_ERROR",
            ReportError::Render(_) => "RENDER_ERROR",
            ReportError::TimedOut { .. } => "REPORT_TIMEOUT",
            ReportError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Human-readable message saved on the failed report record.
    pub fn status_message(&self) -> String {
        match self {
            ReportError::IterationBudgetExhausted { .. } | ReportError::EmptyContent => {
                format!("The counselor could not finish the report: {self}")
            }
            ReportError::Completion(_) => {
                "The AI service was unavailable while generating the report".to_string()
            }
            ReportError::TimedOut { .. } => "Report generation took too long".to_string(),
            ReportError::Render(_) | ReportError::Storage(_) => {
                "The report document could not be produced".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhaustion_is_distinct_from_empty_content() {
        let exhausted = ReportError::IterationBudgetExhausted { iterations: 3 };
        assert_eq!(exhausted.code(), "ITERATION_BUDGET_EXHAUSTED");
        assert!(exhausted.to_string().contains('3'));
        assert_ne!(exhausted.code(), ReportError::EmptyContent.code());
    }

    #[test]
    fn test_status_message_hides_transport_details() {
        let err = ReportError::Completion(LlmError::Api {
            status: 401,
            message: "invalid api key sk-123".to_string(),
        });
        assert!(!err.status_message().contains("sk-123"));
        assert!(err.to_string().contains("sk-123"));
    }
}
