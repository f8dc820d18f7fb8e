/// Upload handlers - presigned upload issuance and completion
use actix_web::{web, HttpResponse};

use super::AppState;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{AckResponse, CompleteUploadRequest, UploadUrlRequest, UploadUrlResponse};

/// Issue a presigned PUT for a new video
#[utoipa::path(
    post,
    path = "/videos/upload-url",
    tag = "uploads",
    request_body = UploadUrlRequest,
    responses(
        (status = 201, description = "Upload URL issued", body = UploadUrlResponse),
        (status = 400, description = "File too large or not a video type"),
        (status = 412, description = "No storage credentials configured"),
        (status = 503, description = "Stored credentials unusable")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_url(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<UploadUrlRequest>,
) -> Result<HttpResponse> {
    let response = state.uploads.begin_upload(state.facts(), &user, &req).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Start transcoding an uploaded video. Repeated calls are acknowledged.
#[utoipa::path(
    post,
    path = "/videos/complete-upload",
    tag = "uploads",
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Acknowledged", body = AckResponse),
        (status = 403, description = "Caller cannot manage this video"),
        (status = 404, description = "Video not found"),
        (status = 502, description = "Transcode job could not be submitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_upload(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<CompleteUploadRequest>,
) -> Result<HttpResponse> {
    let status = state
        .transcode
        .complete_upload(state.facts(), &user, &req)
        .await?;
    Ok(HttpResponse::Ok().json(AckResponse {
        ack: true,
        transcoding_status: status,
    }))
}
