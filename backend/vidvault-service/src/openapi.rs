use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
/// OpenAPI documentation for the Vidvault service
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services::transcode::JobState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidvault API",
        version = "1.0.0",
        description = "Video ingestion, transcoding and authenticated HLS streaming. Uploads go straight to the owner's bucket through presigned URLs; playback is proxied through a gateway that checks access on every request."
    ),
    paths(
        handlers::uploads::upload_url,
        handlers::uploads::complete_upload,
        handlers::videos::list_videos,
        handlers::videos::get_video,
        handlers::videos::update_video,
        handlers::videos::delete_video,
        handlers::videos::presigned_url,
        handlers::videos::set_visibility,
        handlers::shares::share_video,
        handlers::shares::revoke_share,
        handlers::shares::list_shares,
        handlers::stream::stream_manifest,
        handlers::stream::stream_object,
        handlers::credentials::get_personal,
        handlers::credentials::put_personal,
        handlers::credentials::delete_personal,
        handlers::credentials::get_team,
        handlers::credentials::put_team,
        handlers::credentials::delete_team,
        handlers::transcode::job_event,
    ),
    components(schemas(
        models::TranscodingStatus,
        models::Visibility,
        models::VideoResponse,
        models::VideoListResponse,
        models::UploadUrlRequest,
        models::UploadUrlResponse,
        models::CompleteUploadRequest,
        models::AckResponse,
        models::ManifestKeyResponse,
        models::UpdateVideoRequest,
        models::VisibilityRequest,
        models::ShareRequest,
        models::ShareEntry,
        models::GroupShareEntry,
        models::SharesResponse,
        models::PutCredentialsRequest,
        models::CredentialSummary,
        models::JobEventRequest,
        JobState,
    )),
    tags(
        (name = "uploads", description = "Presigned uploads and upload completion"),
        (name = "videos", description = "Video metadata, visibility and deletion"),
        (name = "sharing", description = "Direct and group shares"),
        (name = "streaming", description = "Authenticated HLS playback"),
        (name = "credentials", description = "Personal and team storage credentials"),
        (name = "transcoding", description = "Transcode job callbacks"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("RS256 access token"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "webhook_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Shared secret presented by the transcode job API"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/videos/upload-url"));
        assert!(paths.contains_key("/videos/{id}/stream"));
        assert!(paths.contains_key("/teams/{team_id}/credentials"));
        assert!(paths.contains_key("/transcode/jobs/{job_id}/events"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("UploadUrlRequest"));
    }
}
