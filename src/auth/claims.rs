/// Session token payload: the user id plus the registered claims the
/// server checks (`exp`, `iat`, `iss`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: i64,
    /// Compared against the user's last password change
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    /// Create new claims for `user_id` valid for `expiry_seconds` from now
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// A subject that is not a UUID means the token was not issued here
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}
