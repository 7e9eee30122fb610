//! Session token issuing and verification
//!
//! Login exchanges the static API key for a short-lived HS256 token
//! carrying the user's identity and trust flag. Every management request
//! presents it as `Authorization: Bearer <token>`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token lifetime in minutes
const TOKEN_TTL_MINUTES: i64 = 60;

/// Clock-skew leeway for expiry checks, in seconds
const LEEWAY_SECS: u64 = 10;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub user_id: i64,
    pub is_trusted: bool,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("JWT is missing or malformed")]
    Malformed,

    #[error("JWT has expired")]
    Expired,

    #[error("Invalid JWT")]
    Invalid,
}

/// Issue a session token for an authenticated user.
pub fn issue_token(
    secret: &str,
    email: &str,
    user_id: i64,
    is_trusted: bool,
) -> Result<String, AuthError> {
    let claims = Claims {
        email: email.to_string(),
        user_id,
        is_trusted,
        exp: (Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::Invalid)
}

/// Verify a session token and return its claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = LEEWAY_SECS;
    validation.set_required_spec_claims(&["exp"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid,
    })
}

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
