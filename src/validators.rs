/// Input validators shared by the models
/// Features:
/// 1. Length limits on free text (DoS protection)
/// 2. Email format validation and normalization
/// 3. Control character rejection in names
/// 4. URL slug generation for tour names

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
pub const MAX_USER_NAME_LENGTH: usize = 120;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();

    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Validates and normalizes an email address
/// - Trims and lowercases
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim().to_lowercase();

    if trimmed.is_empty() {
        return Err(ValidationError::InvalidFormat(
            "Please provide your email.".to_string(),
        ));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&trimmed) || has_suspicious_email_patterns(&trimmed) {
        return Err(ValidationError::InvalidFormat(
            "Please provide a valid email".to_string(),
        ));
    }

    Ok(trimmed)
}

/// Validates a person's name
/// - Required, at most 120 characters
/// - No control characters
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::InvalidFormat(
            "Please, tell us your name!".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_USER_NAME_LENGTH {
        return Err(ValidationError::InvalidFormat(format!(
            "Your name must have less than {} characters.",
            MAX_USER_NAME_LENGTH
        )));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("name".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Turns a tour name into a lowercase, hyphen separated URL slug
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part longer than allowed by RFC 5321
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    name.contains('\0') || name.chars().any(|c| c.is_control())
}
