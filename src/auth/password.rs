/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt and the password rules applied on
/// signup, reset and update.

use bcrypt::{hash, verify};

use crate::error::{AppError, Violations};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const BCRYPT_COST: u32 = 12;

/// Hash a password using bcrypt
///
/// Callers validate with [`validate_new_password`] first.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// [`hash_password`] on the blocking pool, for callers on an async worker
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    actix_web::web::block(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing was cancelled: {}", e)))?
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Validate a new password and its confirmation
///
/// Requirements:
/// - Minimum 8 characters
/// - Maximum 128 characters (bcrypt limitation and DoS prevention)
/// - Confirmation must be identical
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AppError> {
    let mut violations = Violations::new();
    password_violations(&mut violations, password, confirm);
    violations.into_result()
}

/// Append password rule failures to an existing collector
pub fn password_violations(violations: &mut Violations, password: &str, confirm: &str) {
    violations
        .check(!password.is_empty(), "Please provide your password.")
        .check(
            password.is_empty() || password.chars().count() >= MIN_PASSWORD_LENGTH,
            "Your password must have 8 or more characters",
        )
        .check(
            password.chars().count() <= MAX_PASSWORD_LENGTH,
            "Your password must have at most 128 characters",
        )
        .check(!confirm.is_empty(), "Please confirm your password")
        .check(
            confirm.is_empty() || password == confirm,
            "Passwords are not the same!",
        );
}
