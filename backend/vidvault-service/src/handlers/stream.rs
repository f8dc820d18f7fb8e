/// Stream handlers - proxied manifests and segments
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::services::streaming::{StreamBody, StreamedObject};
use crate::services::Viewer;

fn into_response(object: StreamedObject) -> HttpResponse {
    let mut builder = HttpResponse::Ok();
    builder
        .content_type(object.content_type)
        .insert_header((header::CACHE_CONTROL, object.cache_control))
        .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"));

    match object.body {
        StreamBody::Full(bytes) => builder.body(bytes),
        StreamBody::Stream(stream) => {
            if let Some(len) = object.content_length {
                builder.no_chunking(len);
            }
            builder.streaming(stream)
        }
    }
}

/// Top-level playlist, rewritten to gateway URLs
#[utoipa::path(
    get,
    path = "/videos/{id}/stream",
    tag = "streaming",
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "HLS master playlist"),
        (status = 404, description = "Missing or not visible to the caller"),
        (status = 425, description = "Not transcoded yet"),
        (status = 503, description = "Storage credentials unusable")
    )
)]
pub async fn stream_manifest(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let viewer = Viewer::from_auth(user.as_ref());
    let object = state
        .gateway
        .get_manifest(state.facts(), &viewer, video_id.into_inner())
        .await?;
    Ok(into_response(object))
}

/// Any object under the video's rendition prefix
#[utoipa::path(
    get,
    path = "/videos/{id}/stream/{key}",
    tag = "streaming",
    params(
        ("id" = Uuid, Path, description = "Video id"),
        ("key" = String, Path, description = "Object key under the video's output prefix")
    ),
    responses(
        (status = 200, description = "Playlist or media segment"),
        (status = 404, description = "Missing, outside the video, or not visible to the caller"),
        (status = 425, description = "Not transcoded yet"),
        (status = 503, description = "Storage credentials unusable")
    )
)]
pub async fn stream_object(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let (video_id, key) = path.into_inner();
    let viewer = Viewer::from_auth(user.as_ref());
    let object = state
        .gateway
        .get_object(state.facts(), &viewer, video_id, &key)
        .await?;
    Ok(into_response(object))
}
