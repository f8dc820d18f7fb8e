/// HTTP middleware utilities for vidvault-service
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use crypto_core::JwtValidator;
use futures::future::{ready, LocalBoxFuture, Ready};
use sha2::{Digest, Sha256};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics;
use crate::models::normalize_email;

/// Authenticated caller, inserted by [`JwtAuthMiddleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// Normalized
    pub email: String,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()).into()),
        )
    }
}

/// `Bearer <token>` from the Authorization header. `Ok(None)` when absent.
fn bearer_token(req: &ServiceRequest) -> Result<Option<String>, AppError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim().to_string()))
        .ok_or_else(|| AppError::Unauthorized("invalid Authorization scheme".to_string()))
}

/// Validates RS256 access tokens. In optional mode a request without a token
/// passes through anonymously; a present but invalid token is always 401.
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    validator: Arc<JwtValidator>,
    required: bool,
}

impl JwtAuthMiddleware {
    pub fn required(validator: Arc<JwtValidator>) -> Self {
        Self {
            validator,
            required: true,
        }
    }

    pub fn optional(validator: Arc<JwtValidator>) -> Self {
        Self {
            validator,
            required: false,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            validator: self.validator.clone(),
            required: self.required,
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    validator: Arc<JwtValidator>,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let validator = self.validator.clone();
        let required = self.required;

        Box::pin(async move {
            let token = match bearer_token(&req)? {
                Some(token) => token,
                None if required => {
                    return Err(AppError::Unauthorized("missing bearer token".to_string()).into())
                }
                None => return service.call(req).await,
            };

            let claims = validator.validate(&token).map_err(|e| {
                tracing::debug!(error = %e, "rejected access token");
                AppError::from(e)
            })?;
            let user_id = claims.user_id().map_err(AppError::from)?;

            req.extensions_mut().insert(AuthUser {
                user_id,
                email: normalize_email(&claims.email),
            });

            service.call(req).await
        })
    }
}

/// Compare a presented webhook bearer token against the configured secret
/// without leaking how many leading bytes matched
pub fn verify_shared_token(req: &HttpRequest, expected: &str) -> Result<(), AppError> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    if expected.is_empty() {
        return Err(AppError::Unauthorized(
            "webhook authentication is not configured".to_string(),
        ));
    }

    let a = Sha256::digest(presented.trim().as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    if diff == 0 {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid webhook token".to_string()))
    }
}

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start.elapsed();
            match &res {
                Ok(response) => {
                    // Route pattern, not the raw path, keeps label cardinality bounded
                    let path = response
                        .request()
                        .match_pattern()
                        .unwrap_or_else(|| "unmatched".to_string());
                    let status = response.status().as_u16();
                    metrics::observe_http_request(&method, &path, status, elapsed);
                    tracing::debug!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
                }
                Err(err) => {
                    let status = err.as_response_error().status_code().as_u16();
                    metrics::observe_http_request(&method, "unmatched", status, elapsed);
                }
            }
            res
        })
    }
}
