/// Authentication module
///
/// Handles JWT signing/validation, password hashing, password reset
/// tokens and resolving the user behind a request.

mod claims;
mod jwt;
mod password;
mod reset_token;
mod session;

pub use claims::Claims;
pub use jwt::sign_token;
pub use jwt::verify_token;
pub use password::hash_password;
pub use password::hash_password_blocking;
pub use password::password_violations;
pub use password::validate_new_password;
pub use password::verify_password;
pub use reset_token::hash_token;
pub use reset_token::ResetToken;
pub use session::authenticate;
pub use session::restrict_to;
pub use session::token_from_request;
pub use session::CurrentUser;
pub use session::OptionalUser;
pub use session::JWT_COOKIE;
