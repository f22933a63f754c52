//! Report persistence: artifacts in S3, metadata rows in PostgreSQL.
//!
//! A `completed` row is only ever inserted after its artifact upload succeeded,
//! and a failed insert removes the uploaded object again. Failed generations get
//! a `failed` row with an empty key and the error message.

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::StudentProfile;
use crate::models::report::{ReportRow, ReportStatus};
use crate::report::assembly::ReportArtifact;
use crate::report::error::ReportError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 50;
const RECENT_REPORTS: i64 = 5;

/// Metadata handed back once an artifact is stored.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub report_id: Uuid,
    pub file_name: String,
    pub s3_key: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

pub fn artifact_key(file_name: &str) -> String {
    format!("reports/{file_name}")
}

/// Uploads the artifact, then records it as `completed`.
pub async fn store_completed(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    owner_id: Uuid,
    profile: &StudentProfile,
    artifact: ReportArtifact,
) -> Result<StoredReport, ReportError> {
    let s3_key = artifact_key(&artifact.file_name);
    let file_size = artifact.size as i64;
    let report_data = serde_json::to_value(profile)
        .map_err(|e| ReportError::Storage(format!("failed to serialize profile: {e}")))?;

    s3.put_object()
        .bucket(bucket)
        .key(&s3_key)
        .content_type("application/pdf")
        .body(ByteStream::from(artifact.bytes))
        .send()
        .await
        .map_err(|e| ReportError::Storage(format!("S3 upload failed: {e}")))?;
    info!("Uploaded report artifact to s3://{bucket}/{s3_key} ({file_size} bytes)");

    let inserted = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
        r#"
        INSERT INTO reports (id, user_id, file_name, s3_key, file_size, status, report_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(&artifact.file_name)
    .bind(&s3_key)
    .bind(file_size)
    .bind(ReportStatus::Completed.as_str())
    .bind(&report_data)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok((report_id, created_at)) => Ok(StoredReport {
            report_id,
            file_name: artifact.file_name,
            s3_key,
            file_size,
            created_at,
        }),
        Err(e) => {
            // Never leave an artifact without a completed row pointing at it.
            if let Err(cleanup) = s3.delete_object().bucket(bucket).key(&s3_key).send().await {
                error!("Failed to remove orphaned artifact {s3_key}: {cleanup}");
            }
            Err(ReportError::Storage(format!("failed to record report: {e}")))
        }
    }
}

/// Records a generation failure for the user to see.
pub async fn store_failed(
    pool: &PgPool,
    owner_id: Uuid,
    profile: &StudentProfile,
    message: &str,
) -> Result<Uuid, sqlx::Error> {
    let report_data = serde_json::to_value(profile).unwrap_or_default();
    let file_name = format!("failed_{}.pdf", Utc::now().timestamp_millis());

    sqlx::query_scalar(
        r#"
        INSERT INTO reports (id, user_id, file_name, s3_key, status, error_message, report_data)
        VALUES ($1, $2, $3, '', $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(file_name)
    .bind(ReportStatus::Failed.as_str())
    .bind(message)
    .bind(report_data)
    .fetch_one(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

/// Page request after defaults and caps are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_reports: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    pub fn new(request: PageRequest, total_reports: i64) -> Self {
        let limit = request.limit as i64;
        let total_pages = ((total_reports + limit - 1) / limit) as u32;
        Self {
            current_page: request.page,
            total_pages,
            total_reports,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}

/// A report as it appears in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub file_name: String,
    pub student_name: String,
    pub interests: Vec<String>,
    pub file_size: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ReportRow> for ReportSummary {
    fn from(row: &ReportRow) -> Self {
        let interests = row
            .report_data
            .get("interests")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        Self {
            id: row.id,
            file_name: row.file_name.clone(),
            student_name: row.student_name().to_string(),
            interests,
            file_size: row.file_size,
            status: row.status.clone(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub reports: Vec<ReportSummary>,
    pub pagination: PageInfo,
}

/// Lists a user's reports, newest first.
pub async fn list_reports(
    pool: &PgPool,
    owner_id: Uuid,
    request: PageRequest,
) -> Result<ReportPage, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT * FROM reports WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(owner_id)
    .bind(request.limit as i64)
    .bind(request.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE user_id = $1")
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    Ok(ReportPage {
        reports: rows.iter().map(ReportSummary::from).collect(),
        pagination: PageInfo::new(request, total),
    })
}

/// Fetches one report, scoped to its owner.
pub async fn find_report(
    pool: &PgPool,
    owner_id: Uuid,
    report_id: Uuid,
) -> Result<Option<ReportRow>, sqlx::Error> {
    sqlx::query_as::<_, ReportRow>("SELECT * FROM reports WHERE id = $1 AND user_id = $2")
        .bind(report_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Deletes the row, then its artifact. Returns `false` if the user has no such report.
///
/// A failed object delete leaves an unreferenced object in the bucket and is
/// only logged; the report is gone either way.
pub async fn delete_report(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    owner_id: Uuid,
    report_id: Uuid,
) -> Result<bool, AppError> {
    let deleted: Option<String> = sqlx::query_scalar(
        "DELETE FROM reports WHERE id = $1 AND user_id = $2 RETURNING s3_key",
    )
    .bind(report_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    let Some(s3_key) = deleted else {
        return Ok(false);
    };

    if !s3_key.is_empty() {
        if let Err(e) = s3.delete_object().bucket(bucket).key(&s3_key).send().await {
            error!("Failed to remove artifact {s3_key} of deleted report {report_id}: {e}");
        }
    }

    info!("Deleted report {report_id} for user {owner_id}");
    Ok(true)
}

/// Downloads a stored artifact.
pub async fn download_artifact(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    s3_key: &str,
) -> Result<Bytes, AppError> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(s3_key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("download {s3_key} failed: {e}")))?;

    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::S3(format!("reading {s3_key} failed: {e}")))?;
    Ok(data.into_bytes())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_reports: i64,
    pub completed_reports: i64,
    pub failed_reports: i64,
    pub generating_reports: i64,
    pub total_file_size: i64,
    #[serde(rename = "totalFileSizeMB")]
    pub total_file_size_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_reports: Vec<ReportSummary>,
}

pub async fn dashboard(pool: &PgPool, owner_id: Uuid) -> Result<Dashboard, sqlx::Error> {
    let (total, completed, failed, generating, total_size) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'completed'),
                COUNT(*) FILTER (WHERE status = 'failed'),
                COUNT(*) FILTER (WHERE status = 'generating'),
                COALESCE(SUM(file_size), 0)::BIGINT
            FROM reports
            WHERE user_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await?;

    let recent = sqlx::query_as::<_, ReportRow>(
        "SELECT * FROM reports WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(owner_id)
    .bind(RECENT_REPORTS)
    .fetch_all(pool)
    .await?;

    Ok(Dashboard {
        stats: DashboardStats {
            total_reports: total,
            completed_reports: completed,
            failed_reports: failed,
            generating_reports: generating,
            total_file_size: total_size,
            total_file_size_mb: bytes_to_mb(total_size),
        },
        recent_reports: recent.iter().map(ReportSummary::from).collect(),
    })
}

/// Megabytes rounded to two decimals.
fn bytes_to_mb(bytes: i64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}
