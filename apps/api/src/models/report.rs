use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a report record. Only `Completed` rows point at a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Generating,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Generating => "generating",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Empty for failed reports.
    pub s3_key: String,
    pub file_size: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
    pub report_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportRow {
    pub fn is_completed(&self) -> bool {
        self.status == ReportStatus::Completed.as_str()
    }

    /// Student name recorded with the report, if the stored profile has one.
    pub fn student_name(&self) -> &str {
        self.report_data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}
