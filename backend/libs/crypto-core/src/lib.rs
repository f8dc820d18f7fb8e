//! Cryptographic building blocks shared by Vidvault services.
//!
//! - [`secret_box`]: authenticated symmetric encryption for secrets at rest
//! - [`jwt`]: RS256 access-token validation

pub mod jwt;
pub mod secret_box;

pub use jwt::{Claims, JwtError, JwtValidator};
pub use secret_box::{generate_key, SealedSecret, SecretBox, SecretBoxError};
