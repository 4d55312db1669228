/// Password Reset Token Management
///
/// Reset tokens are:
/// - 32 random bytes, hex encoded (this is what the user receives by email)
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Valid for 10 minutes
/// - Cleared once used, or when the email could not be delivered

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// A freshly minted reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Sent to the user, never stored
    pub plain: String,
    /// Stored on the user row
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);

        Self {
            hash: hash_token(&plain),
            plain,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

/// Hash a reset token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reset_token() {
        let token = ResetToken::generate();

        assert_eq!(token.plain.len(), 64);
        assert!(token.plain.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.hash, hash_token(&token.plain));
        assert_ne!(token.plain, token.hash);
    }

    #[test]
    fn test_reset_token_expires_in_ten_minutes() {
        let token = ResetToken::generate();
        let remaining = token.expires_at - Utc::now();

        assert!(remaining <= Duration::minutes(10));
        assert!(remaining > Duration::minutes(9));
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        let first = ResetToken::generate();
        let second = ResetToken::generate();

        assert_ne!(first.plain, second.plain);
        assert_ne!(first.hash, second.hash);
    }
}
