//! Axum route handlers for the Report API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::report::ReportRow;
use crate::report::chat::{chat_about_report, ChatRequest, ChatResponse};
use crate::report::generator::{generate_report, GenerateReportRequest, GenerateReportResponse};
use crate::report::store::{self, Dashboard, PageRequest, ReportPage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Uuid,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// POST /api/v1/reports
///
/// Runs the full pipeline synchronously. A failed record is stored for every
/// fatal generation error.
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<(StatusCode, Json<GenerateReportResponse>), AppError> {
    request.profile.validate()?;
    let response = generate_report(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/reports
pub async fn handle_list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ReportPage>, AppError> {
    let page = PageRequest::new(params.page, params.limit);
    let reports = store::list_reports(&state.db, params.user_id, page).await?;
    Ok(Json(reports))
}

/// GET /api/v1/reports/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ReportRow>, AppError> {
    store::find_report(&state.db, params.user_id, report_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))
}

/// DELETE /api/v1/reports/:id
pub async fn handle_delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let deleted = store::delete_report(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        params.user_id,
        report_id,
    )
    .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Report {report_id} not found")))
    }
}

/// GET /api/v1/dashboard/stats
pub async fn handle_dashboard_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(store::dashboard(&state.db, params.user_id).await?))
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    Ok(Json(chat_about_report(&state, request).await?))
}
