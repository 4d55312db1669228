/// Centralized Error Handling Module
///
/// Every failure in the application ends up as an `AppError`. This module
/// normalizes the handful of error shapes produced by the database driver,
/// the JWT library, model validation and the outer services into an HTTP
/// status and a stable JSON body:
///
/// ```json
/// { "status": "fail", "message": "...", "code": "...", "errorId": "..." }
/// ```
///
/// `status` is `"fail"` for 4xx and `"error"` for 5xx. Non-operational
/// errors (bugs, driver failures) never leak their message in production.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use lazy_static::lazy_static;
use regex::Regex;
use std::error::Error as StdError;
use std::fmt;
use std::sync::OnceLock;

use crate::configuration::Environment;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Record the runtime environment used when rendering error bodies.
///
/// Only the first call wins. Until it is called errors render as in
/// production.
pub fn set_environment(environment: Environment) {
    let _ = ENVIRONMENT.set(environment);
}

pub fn current_environment() -> Environment {
    ENVIRONMENT.get().copied().unwrap_or(Environment::Production)
}

lazy_static! {
    // Postgres unique violation detail: `Key (email)=(jonas@example.com) already exists.`
    static ref DUPLICATE_KEY_DETAIL: Regex = Regex::new(r"\(([^)]*)\)=\(([^)]*)\)").unwrap();
}

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    /// A value could not be converted to the field's type
    Cast { field: String, value: String },
    /// Model level validation, one message per failed rule
    Invalid(Vec<String>),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::Cast { field, value } => write!(f, "Invalid {}: {}.", field, value),
            ValidationError::Invalid(messages) => {
                write!(f, "Invalid input data. {}.", messages.join(". "))
            }
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors
#[derive(Debug)]
pub enum DatabaseError {
    /// Unique constraint violation, carries the offending value
    DuplicateField(String),
    /// Referenced row does not exist
    InvalidReference(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::DuplicateField(value) => write!(
                f,
                "Duplicate field value: \"{}\". Please use another value!",
                value
            ),
            DatabaseError::InvalidReference(msg) => write!(f, "Invalid reference: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Email service errors
#[derive(Debug, Clone)]
pub enum EmailError {
    SendFailed(String),
    ServiceUnavailable(String),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::SendFailed(msg) => write!(f, "Failed to send email: {}", msg),
            EmailError::ServiceUnavailable(msg) => {
                write!(f, "Email service unavailable: {}", msg)
            }
        }
    }
}

impl StdError for EmailError {}

/// Payment provider errors
#[derive(Debug, Clone)]
pub enum PaymentError {
    RequestFailed(String),
    Rejected(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::RequestFailed(msg) => write!(f, "Payment request failed: {}", msg),
            PaymentError::Rejected(msg) => write!(f, "Payment provider rejected request: {}", msg),
        }
    }
}

impl StdError for PaymentError {}

/// Authentication and authorization errors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
    MissingToken,
    TokenInvalid,
    TokenExpired,
    UserNoLongerExists,
    PasswordChanged,
    WrongCurrentPassword,
    ResetTokenInvalid,
    Forbidden,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthError::MissingCredentials => "Please provide email and password!",
            AuthError::InvalidCredentials => "Incorrect email or password",
            AuthError::MissingToken => "You are not logged in! Please log in to get access.",
            AuthError::TokenInvalid => "Invalid token. Please log in again!",
            AuthError::TokenExpired => "Your token has expired! Please log in again.",
            AuthError::UserNoLongerExists => {
                "The user belonging to this token does no longer exist."
            }
            AuthError::PasswordChanged => "User recently changed password! Please log in again.",
            AuthError::WrongCurrentPassword => "Your current password is wrong.",
            AuthError::ResetTokenInvalid => "Token is invalid or has expired",
            AuthError::Forbidden => "You do not have permission to perform this action",
        };
        write!(f, "{}", msg)
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Email(EmailError),
    Payment(PaymentError),
    Auth(AuthError),
    /// Operational 400 with a caller supplied message
    BadRequest(String),
    NotFound(String),
    RateLimited,
    /// Operational 500, e.g. a route that exists but is not meant to be used
    Unsupported(String),
    /// Programming or unknown error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Email(e) => write!(f, "{}", e),
            AppError::Payment(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::BadRequest(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::RateLimited => write!(
                f,
                "Too many requests from this IP, please try again in an hour!"
            ),
            AppError::Unsupported(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// The generic 404 raised by the handler factory
    pub fn document_not_found() -> Self {
        AppError::NotFound("No document found with that ID".to_string())
    }

    pub fn cast(field: &str, value: &str) -> Self {
        AppError::Validation(ValidationError::Cast {
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::DuplicateField(_) | DatabaseError::InvalidReference(_) => {
                    StatusCode::BAD_REQUEST
                }
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                DatabaseError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Email(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(e) => match e {
                AuthError::MissingCredentials | AuthError::ResetTokenInvalid => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unsupported(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `"fail"` for client errors, `"error"` for everything else
    pub fn status(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Operational errors are expected failures whose message is safe to
    /// show to the client.
    pub fn is_operational(&self) -> bool {
        match self {
            AppError::Database(DatabaseError::UnexpectedError(_))
            | AppError::Database(DatabaseError::ConnectionPool(_))
            | AppError::Internal(_) => false,
            _ => true,
        }
    }

    /// Message shown to the client
    pub fn public_message(&self) -> String {
        match self {
            AppError::Email(_) => {
                "There was an error sending the email. Try again later!".to_string()
            }
            AppError::Payment(_) => "Could not create a checkout session.".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(ValidationError::Cast { .. }) => "INVALID_ID",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(DatabaseError::DuplicateField(_)) => "DUPLICATE_ENTRY",
            AppError::Database(DatabaseError::InvalidReference(_)) => "INVALID_REFERENCE",
            AppError::Database(DatabaseError::ConnectionPool(_)) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Email(_) => "EMAIL_SERVICE_ERROR",
            AppError::Payment(_) => "PAYMENT_ERROR",
            AppError::Auth(e) => match e {
                AuthError::MissingCredentials => "MISSING_CREDENTIALS",
                AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                AuthError::MissingToken => "UNAUTHORIZED",
                AuthError::TokenInvalid => "TOKEN_INVALID",
                AuthError::TokenExpired => "TOKEN_EXPIRED",
                AuthError::UserNoLongerExists => "USER_NOT_FOUND",
                AuthError::PasswordChanged => "PASSWORD_CHANGED",
                AuthError::WrongCurrentPassword => "WRONG_PASSWORD",
                AuthError::ResetTokenInvalid => "RESET_TOKEN_INVALID",
                AuthError::Forbidden => "FORBIDDEN",
            },
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Unsupported(_) => "UNSUPPORTED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS (Control Flow Error Conversion)
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Email(err)
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::Payment(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::document_not_found(),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(db_err) => {
                let detail = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .unwrap_or_else(|| db_err.message())
                    .to_string();

                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => AppError::Database(DatabaseError::DuplicateField(
                        duplicate_value(&detail),
                    )),
                    // foreign_key_violation
                    Some("23503") => {
                        AppError::Database(DatabaseError::InvalidReference(detail))
                    }
                    // check_violation
                    Some("23514") => AppError::Validation(ValidationError::Invalid(vec![
                        "A value violates a data constraint".to_string(),
                    ])),
                    _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
                }
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Auth(AuthError::TokenExpired)
            }
            _ => AppError::Auth(AuthError::TokenInvalid),
        }
    }
}

/// Extract the quoted value from a unique violation detail, falling back to
/// the whole detail when the driver message has an unexpected shape.
fn duplicate_value(detail: &str) -> String {
    DUPLICATE_KEY_DETAIL
        .captures(detail)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| detail.to_string())
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// `fail` or `error`
    pub status: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// Unique error ID for tracking
    pub error_id: String,
    /// Debug representation, development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Build the body for `error` as seen by a client in `environment`
    pub fn from_error(error: &AppError, error_id: &str, environment: Environment) -> Self {
        if environment.is_production() && !error.is_operational() {
            return Self {
                status: "error".to_string(),
                message: "Something went very wrong!".to_string(),
                code: error.code().to_string(),
                error_id: error_id.to_string(),
                detail: None,
            };
        }

        Self {
            status: error.status().to_string(),
            message: error.public_message(),
            code: error.code().to_string(),
            error_id: error_id.to_string(),
            detail: match environment {
                Environment::Development => Some(format!("{:?}", error)),
                Environment::Production => None,
            },
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response_for(&self, error_id: &str, environment: Environment)
        -> (StatusCode, ErrorResponse);
    fn log_error(&self, error_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response_for(
        &self,
        error_id: &str,
        environment: Environment,
    ) -> (StatusCode, ErrorResponse) {
        let status = if environment.is_production() && !self.is_operational() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            self.status_code()
        };
        (status, ErrorResponse::from_error(self, error_id, environment))
    }

    fn log_error(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::DuplicateField(_)) => {
                tracing::warn!(error_id = error_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(error_id = error_id, error = %e, "Database error");
            }
            AppError::Email(e) => {
                tracing::error!(error_id = error_id, error = %e, "Email service error");
            }
            AppError::Payment(e) => {
                tracing::error!(error_id = error_id, error = %e, "Payment provider error");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::BadRequest(_) | AppError::NotFound(_) | AppError::RateLimited => {
                tracing::info!(error_id = error_id, error = %self, "Request rejected");
            }
            AppError::Unsupported(msg) => {
                tracing::warn!(error_id = error_id, error = %msg, "Unsupported route called");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let (status, body) = self.error_response_for(&error_id, current_environment());

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }
}

// ============================================================================
// 4. VALIDATION COLLECTOR
// ============================================================================

/// Accumulates model validation failures so they can be reported together
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.0.push(message.to_string());
        }
        self
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(ValidationError::Invalid(self.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::TooLong("email".to_string(), 254);
        assert_eq!(err.to_string(), "email is too long (maximum 254 characters)");
    }

    #[test]
    fn test_cast_error_message() {
        let err = AppError::cast("id", "wwwww");
        assert_eq!(err.to_string(), "Invalid id: wwwww.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.status(), "fail");
    }

    #[test]
    fn test_violations_join_messages() {
        let mut violations = Violations::new();
        violations
            .check(false, "A tour must have a name")
            .check(true, "never shown")
            .check(false, "Difficulty must be easy, medium or difficult");

        let err = violations.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input data. A tour must have a name. Difficulty must be easy, medium or difficult."
        );
    }

    #[test]
    fn test_empty_violations_are_ok() {
        assert!(Violations::new().into_result().is_ok());
    }

    #[test]
    fn test_duplicate_value_extraction() {
        assert_eq!(
            duplicate_value("Key (email)=(jonas@example.com) already exists."),
            "jonas@example.com"
        );
        assert_eq!(duplicate_value("something else"), "something else");

        let err = AppError::Database(DatabaseError::DuplicateField("The Forest Hiker".into()));
        assert_eq!(
            err.to_string(),
            "Duplicate field value: \"The Forest Hiker\". Please use another value!"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "No document found with that ID");
    }

    #[test]
    fn test_auth_status_codes() {
        assert_eq!(
            AppError::from(AuthError::TokenExpired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AuthError::MissingCredentials).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::ResetTokenInvalid).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_production_hides_non_operational_errors() {
        let err = AppError::Internal("null pointer in tour handler".to_string());
        let (status, body) = err.error_response_for("id-1", Environment::Production);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Something went very wrong!");
        assert!(body.detail.is_none());
    }

    #[test]
    fn test_outer_service_failures_keep_their_status() {
        let pool = AppError::Database(DatabaseError::ConnectionPool("timed out".to_string()));
        let (status, body) = pool.error_response_for("id-2", Environment::Production);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Something went very wrong!");

        let payment = AppError::Payment(PaymentError::Rejected("402: card_declined".to_string()));
        let (status, body) = payment.error_response_for("id-3", Environment::Production);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Could not create a checkout session.");
    }

    #[test]
    fn test_production_shows_operational_errors() {
        let err = AppError::NotFound("No document found with that ID".to_string());
        let (status, body) = err.error_response_for("id-2", Environment::Production);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "No document found with that ID");
        assert_eq!(body.error_id, "id-2");
    }

    #[test]
    fn test_development_includes_detail() {
        let err = AppError::Internal("boom".to_string());
        let (status, body) = err.error_response_for("id-3", Environment::Development);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal error: boom");
        assert!(body.detail.unwrap().contains("boom"));
    }

    #[test]
    fn test_email_error_public_message() {
        let err = AppError::Email(EmailError::SendFailed("smtp down".into()));
        assert_eq!(
            err.public_message(),
            "There was an error sending the email. Try again later!"
        );
        assert!(err.is_operational());
    }

    #[test]
    fn test_rate_limited_message() {
        let err = AppError::RateLimited;
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            err.to_string(),
            "Too many requests from this IP, please try again in an hour!"
        );
    }
}
