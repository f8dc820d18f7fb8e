/// HTTP handlers for Vidvault
///
/// - Uploads: presigned upload issuance and completion
/// - Videos: metadata, visibility, deletion, manifest lookup
/// - Shares: direct and group shares
/// - Stream: authenticated manifest and segment proxy
/// - Credentials: personal and team storage credentials
/// - Transcode: job status webhook
pub mod credentials;
pub mod health;
pub mod shares;
pub mod stream;
pub mod transcode;
pub mod uploads;
pub mod videos;

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use crypto_core::JwtValidator;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::JwtAuthMiddleware;
use crate::services::transcode::TranscodeJobClient;
use crate::services::{
    AccessFacts, CredentialVault, ObjectStore, PgAccessFacts, StreamingGateway,
    TranscodeOrchestrator, UploadAuthorizer, VideoManager,
};

/// Shared state handed to every handler
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub facts: Arc<dyn AccessFacts>,
    pub vault: Arc<CredentialVault>,
    pub uploads: UploadAuthorizer,
    pub transcode: TranscodeOrchestrator,
    pub gateway: StreamingGateway,
    pub videos: VideoManager,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        store: Arc<dyn ObjectStore>,
        jobs: Arc<dyn TranscodeJobClient>,
    ) -> Result<Self> {
        let vault = Arc::new(
            CredentialVault::from_config(&config.vault)
                .map_err(|e| AppError::Internal(format!("invalid vault configuration: {e}")))?,
        );

        let uploads = UploadAuthorizer::new(
            pool.clone(),
            vault.clone(),
            store.clone(),
            config.upload.clone(),
        );
        let transcode = TranscodeOrchestrator::new(
            pool.clone(),
            vault.clone(),
            jobs,
            config.transcode.manifest_file_name.clone(),
        );
        let gateway = StreamingGateway::new(
            pool.clone(),
            vault.clone(),
            store.clone(),
            config.streaming.clone(),
            config.app.public_base_url.clone(),
        )?;
        let videos = VideoManager::new(pool.clone(), vault.clone(), store);

        Ok(Self {
            facts: Arc::new(PgAccessFacts::new(pool.clone())),
            pool,
            config,
            vault,
            uploads,
            transcode,
            gateway,
            videos,
        })
    }

    pub fn facts(&self) -> &dyn AccessFacts {
        self.facts.as_ref()
    }
}

/// Register every route. Health, metrics, docs and the transcode webhook sit
/// outside token authentication.
pub fn configure(cfg: &mut web::ServiceConfig, validator: Arc<JwtValidator>) {
    cfg.route("/health", web::get().to(health::health))
        .route("/health/ready", web::get().to(health::ready))
        .route("/health/live", web::get().to(health::live))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .route("/openapi.json", web::get().to(openapi_json))
        .route(
            "/transcode/jobs/{job_id}/events",
            web::post().to(transcode::job_event),
        )
        .service(
            web::scope("/credentials")
                .wrap(JwtAuthMiddleware::required(validator.clone()))
                .route("", web::get().to(credentials::get_personal))
                .route("", web::put().to(credentials::put_personal))
                .route("", web::delete().to(credentials::delete_personal)),
        )
        .service(
            web::scope("/teams")
                .wrap(JwtAuthMiddleware::required(validator.clone()))
                .route("/{team_id}/credentials", web::get().to(credentials::get_team))
                .route("/{team_id}/credentials", web::put().to(credentials::put_team))
                .route(
                    "/{team_id}/credentials",
                    web::delete().to(credentials::delete_team),
                ),
        )
        .service(
            // Optional here; handlers that need a caller extract `AuthUser`
            web::scope("/videos")
                .wrap(JwtAuthMiddleware::optional(validator))
                .route("", web::get().to(videos::list_videos))
                .route("/upload-url", web::post().to(uploads::upload_url))
                .route("/complete-upload", web::post().to(uploads::complete_upload))
                .route("/{id}", web::get().to(videos::get_video))
                .route("/{id}", web::patch().to(videos::update_video))
                .route("/{id}", web::delete().to(videos::delete_video))
                .route("/{id}/presigned-url", web::get().to(videos::presigned_url))
                .route("/{id}/visibility", web::patch().to(videos::set_visibility))
                .route("/{id}/share", web::post().to(shares::share_video))
                .route("/{id}/share", web::delete().to(shares::revoke_share))
                .route("/{id}/shares", web::get().to(shares::list_shares))
                .route("/{id}/stream", web::get().to(stream::stream_manifest))
                .route("/{id}/stream/{key:.*}", web::get().to(stream::stream_object)),
        );
}

async fn openapi_json() -> HttpResponse {
    use utoipa::OpenApi;
    HttpResponse::Ok().json(crate::openapi::ApiDoc::openapi())
}
