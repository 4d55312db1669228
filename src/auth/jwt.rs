/// JWT Token Generation and Validation
///
/// Session tokens are HS256 signed and carry only the user id.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Sign a new session token for a user
///
/// # Errors
/// Returns error if token encoding fails
pub fn sign_token(user_id: &Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(*user_id, config.expiry_seconds(), config.issuer.clone());

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate a session token and extract its claims
///
/// # Errors
/// `TokenExpired` for an expired token, `TokenInvalid` for anything else
/// (bad signature, wrong issuer, garbage input)
pub fn verify_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::from(e)
    })
}
