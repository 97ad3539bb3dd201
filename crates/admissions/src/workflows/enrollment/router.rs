use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::error;

use crate::error::AppError;

use super::jobs::{JobId, JobStage, JobStore};
use super::report::ReportRenderer;
use super::service::{EnrollmentJobService, ReportLookupError};
use super::snapshot::SnapshotSource;

/// Router builder exposing submission, polling and report download for enrollment jobs.
pub fn enrollment_router<S, J, R>(service: Arc<EnrollmentJobService<S, J, R>>) -> Router
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollment/calculate",
            post(calculate_handler::<S, J, R>),
        )
        .route(
            "/api/v1/enrollment/status/:job_id",
            get(status_handler::<S, J, R>).delete(delete_handler::<S, J, R>),
        )
        .route(
            "/api/v1/enrollment/download/:filename",
            get(download_handler::<S, J, R>),
        )
        .with_state(service)
}

pub(crate) async fn calculate_handler<S, J, R>(
    State(service): State<Arc<EnrollmentJobService<S, J, R>>>,
) -> Response
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    let job_id = service.submit();
    let payload = json!({
        "job_id": job_id.0,
        "status": JobStage::Pending.label(),
        "message": "enrollment calculation started; poll the status endpoint with job_id",
    });
    (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
}

pub(crate) async fn status_handler<S, J, R>(
    State(service): State<Arc<EnrollmentJobService<S, J, R>>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    match service.status(&JobId(job_id)) {
        Some(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        None => not_found("job not found"),
    }
}

pub(crate) async fn delete_handler<S, J, R>(
    State(service): State<Arc<EnrollmentJobService<S, J, R>>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    if service.forget(&JobId(job_id)) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("job not found")
    }
}

pub(crate) async fn download_handler<S, J, R>(
    State(service): State<Arc<EnrollmentJobService<S, J, R>>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError>
where
    S: SnapshotSource + 'static,
    J: JobStore + 'static,
    R: ReportRenderer + 'static,
{
    let path = match service.report_file(&filename).await {
        Ok(path) => path,
        Err(ReportLookupError::InvalidName) => {
            let payload = json!({ "error": ReportLookupError::InvalidName.to_string() });
            return Ok((StatusCode::BAD_REQUEST, axum::Json(payload)).into_response());
        }
        Err(ReportLookupError::NotFound) => return Ok(not_found("file not found")),
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(not_found("file not found"))
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read enrollment report");
            return Err(AppError::from(err));
        }
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

fn not_found(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}
