/// Credential handlers - personal and team storage credentials
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{CredentialOwner, CredentialSummary, PutCredentialsRequest};
use crate::services::credentials;

#[utoipa::path(
    get,
    path = "/credentials",
    tag = "credentials",
    responses(
        (status = 200, description = "Stored credential metadata", body = CredentialSummary),
        (status = 412, description = "Nothing configured")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_personal(state: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse> {
    let summary = credentials::get_credentials(
        &state.pool,
        state.facts(),
        &user,
        CredentialOwner::User(user.user_id),
    )
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Store or replace the caller's storage credentials
#[utoipa::path(
    put,
    path = "/credentials",
    tag = "credentials",
    request_body = PutCredentialsRequest,
    responses((status = 200, description = "Saved; the secret is never echoed", body = CredentialSummary)),
    security(("bearer_auth" = []))
)]
pub async fn put_personal(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<PutCredentialsRequest>,
) -> Result<HttpResponse> {
    let summary = credentials::put_credentials(
        &state.pool,
        &state.vault,
        state.facts(),
        &user,
        CredentialOwner::User(user.user_id),
        &req,
    )
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    delete,
    path = "/credentials",
    tag = "credentials",
    responses((status = 204, description = "Removed")),
    security(("bearer_auth" = []))
)]
pub async fn delete_personal(state: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse> {
    credentials::delete_credentials(
        &state.pool,
        state.facts(),
        &user,
        CredentialOwner::User(user.user_id),
    )
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/teams/{team_id}/credentials",
    tag = "credentials",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Stored credential metadata", body = CredentialSummary),
        (status = 403, description = "Not a team owner or admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_team(
    state: web::Data<AppState>,
    user: AuthUser,
    team_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let summary = credentials::get_credentials(
        &state.pool,
        state.facts(),
        &user,
        CredentialOwner::Team(team_id.into_inner()),
    )
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    put,
    path = "/teams/{team_id}/credentials",
    tag = "credentials",
    params(("team_id" = Uuid, Path, description = "Team id")),
    request_body = PutCredentialsRequest,
    responses(
        (status = 200, description = "Saved; the secret is never echoed", body = CredentialSummary),
        (status = 403, description = "Not a team owner or admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn put_team(
    state: web::Data<AppState>,
    user: AuthUser,
    team_id: web::Path<Uuid>,
    req: web::Json<PutCredentialsRequest>,
) -> Result<HttpResponse> {
    let summary = credentials::put_credentials(
        &state.pool,
        &state.vault,
        state.facts(),
        &user,
        CredentialOwner::Team(team_id.into_inner()),
        &req,
    )
    .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    delete,
    path = "/teams/{team_id}/credentials",
    tag = "credentials",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses((status = 204, description = "Removed")),
    security(("bearer_auth" = []))
)]
pub async fn delete_team(
    state: web::Data<AppState>,
    user: AuthUser,
    team_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    credentials::delete_credentials(
        &state.pool,
        state.facts(),
        &user,
        CredentialOwner::Team(team_id.into_inner()),
    )
    .await?;
    Ok(HttpResponse::NoContent().finish())
}
