/// Share handlers - grant, revoke and list view access
use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{ShareRequest, SharesResponse};

/// Share with one email or with a group
#[utoipa::path(
    post,
    path = "/videos/{id}/share",
    tag = "sharing",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = ShareRequest,
    responses(
        (status = 201, description = "Share created"),
        (status = 200, description = "Share already existed"),
        (status = 400, description = "Need exactly one of email or groupId"),
        (status = 403, description = "Caller cannot manage this video")
    ),
    security(("bearer_auth" = []))
)]
pub async fn share_video(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
    req: web::Json<ShareRequest>,
) -> Result<HttpResponse> {
    let created = state
        .videos
        .share(state.facts(), &user, video_id.into_inner(), &req)
        .await?;
    let body = json!({ "shared": true, "created": created });
    Ok(if created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    })
}

/// Revoke an email or group share. Takes effect on the next request.
#[utoipa::path(
    delete,
    path = "/videos/{id}/share",
    tag = "sharing",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = ShareRequest,
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "No such share")
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_share(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
    req: web::Json<ShareRequest>,
) -> Result<HttpResponse> {
    let removed = state
        .videos
        .revoke(state.facts(), &user, video_id.into_inner(), &req)
        .await?;
    if removed {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(crate::error::AppError::NotFound("share not found".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/videos/{id}/shares",
    tag = "sharing",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Current shares", body = SharesResponse),
        (status = 403, description = "Caller cannot manage this video")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_shares(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let shares = state
        .videos
        .list_shares(state.facts(), &user, video_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(shares))
}
