/// Video handlers - metadata, visibility, deletion and manifest lookup
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{
    ManifestKeyResponse, UpdateVideoRequest, VideoListResponse, VideoResponse, VisibilityRequest,
};
use crate::services::Viewer;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Videos the caller manages
#[utoipa::path(
    get,
    path = "/videos",
    tag = "videos",
    params(
        ("limit" = Option<i64>, Query, description = "Page size (1-200, default 50)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Managed videos", body = VideoListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_videos(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let videos = state
        .videos
        .list_manageable(&user, query.limit, query.offset)
        .await?;
    Ok(HttpResponse::Ok().json(VideoListResponse {
        videos: videos.into_iter().map(VideoResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video metadata", body = VideoResponse),
        (status = 404, description = "Missing or not visible to the caller")
    )
)]
pub async fn get_video(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let viewer = Viewer::from_auth(user.as_ref());
    let video = state
        .videos
        .get(state.facts(), &viewer, video_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(VideoResponse::from(video)))
}

#[utoipa::path(
    patch,
    path = "/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Updated", body = VideoResponse),
        (status = 403, description = "Caller cannot manage this video")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_video(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
    req: web::Json<UpdateVideoRequest>,
) -> Result<HttpResponse> {
    let video = state
        .videos
        .update(state.facts(), &user, video_id.into_inner(), &req)
        .await?;
    Ok(HttpResponse::Ok().json(VideoResponse::from(video)))
}

#[utoipa::path(
    delete,
    path = "/videos/{id}",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller cannot manage this video")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_video(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state
        .videos
        .delete(state.facts(), &user, video_id.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Manifest key and gateway URL once transcoding has completed
#[utoipa::path(
    get,
    path = "/videos/{id}/presigned-url",
    tag = "streaming",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Manifest available", body = ManifestKeyResponse),
        (status = 404, description = "Missing or not visible to the caller"),
        (status = 425, description = "Not transcoded yet, or transcoding failed")
    )
)]
pub async fn presigned_url(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let viewer = Viewer::from_auth(user.as_ref());
    let location = state
        .gateway
        .manifest_location(state.facts(), &viewer, video_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(location))
}

#[utoipa::path(
    patch,
    path = "/videos/{id}/visibility",
    tag = "videos",
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = VisibilityRequest,
    responses(
        (status = 200, description = "Visibility changed", body = VideoResponse),
        (status = 403, description = "Caller cannot manage this video")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_visibility(
    state: web::Data<AppState>,
    user: AuthUser,
    video_id: web::Path<Uuid>,
    req: web::Json<VisibilityRequest>,
) -> Result<HttpResponse> {
    let video = state
        .videos
        .set_visibility(state.facts(), &user, video_id.into_inner(), req.visibility)
        .await?;
    Ok(HttpResponse::Ok().json(VideoResponse::from(video)))
}
