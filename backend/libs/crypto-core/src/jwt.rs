/// RS256 access-token validation
///
/// Tokens are issued by the external identity service; Vidvault services only
/// ever validate them. The validator is built from the issuer's public key and
/// handed to whoever needs it, there is no process-wide key slot.
///
/// ## Security Design
///
/// - **RS256 ONLY**: symmetric algorithms are never accepted
/// - **Expiry enforced**: `exp` is always checked
/// - **Access tokens only**: refresh tokens are rejected
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const JWT_ALGORITHM: Algorithm = Algorithm::RS256;
const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("token validation failed: {0}")]
    Invalid(String),

    #[error("token is not an access token")]
    WrongTokenType,

    #[error("subject is not a valid user id")]
    InvalidSubject,
}

/// Claims carried by access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// "access" or "refresh"
    pub token_type: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidSubject)
    }
}

#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Build a validator from the issuer's PEM-encoded RSA public key
    pub fn from_rsa_pem(public_key_pem: &str) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Validate signature, expiry and token type, returning the claims
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        if data.claims.token_type != ACCESS_TOKEN_TYPE {
            tracing::debug!(token_type = %data.claims.token_type, "rejected non-access token");
            return Err(JwtError::WrongTokenType);
        }

        data.claims.user_id()?;
        Ok(data.claims)
    }
}
