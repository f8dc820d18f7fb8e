/// Transcode webhook - job status callbacks from the job API
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::AppState;
use crate::error::Result;
use crate::middleware::verify_shared_token;
use crate::models::JobEventRequest;
use crate::services::transcode::JobStatus;

#[utoipa::path(
    post,
    path = "/transcode/jobs/{job_id}/events",
    tag = "transcoding",
    params(("job_id" = String, Path, description = "Job id returned at submission")),
    request_body = JobEventRequest,
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Missing or wrong webhook token"),
        (status = 404, description = "No video for this job")
    ),
    security(("webhook_token" = []))
)]
pub async fn job_event(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    job_id: web::Path<String>,
    event: web::Json<JobEventRequest>,
) -> Result<HttpResponse> {
    let expected = state.config.transcode.webhook_token.as_deref().unwrap_or_default();
    verify_shared_token(&http_req, expected)?;

    let event = event.into_inner();
    let status = JobStatus {
        state: event.state,
        output_manifest_key: event.output_manifest_key,
        failure_reason: event.failure_reason,
    };
    let updated = state.transcode.handle_job_event(&job_id, &status).await?;

    Ok(HttpResponse::Ok().json(json!({
        "accepted": true,
        "transcodingStatus": updated.map(|v| v.status()),
    })))
}
