/// Authentication Routes
///
/// Signup, login/logout and the password flows. Every successful login
/// style response carries the session token in the body and in the
/// http-only `jwt` cookie.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::audit::{AuditAction, AuditLog};
use crate::auth::{hash_token, sign_token, CurrentUser, JWT_COOKIE};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::email::{Email, EmailClient};
use crate::error::{AppError, AuthError};
use crate::models::{Resource, SignupInput, User};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Sign a token for `user` and send it in the body and the `jwt` cookie
pub fn create_send_token(
    user: &User,
    status: StatusCode,
    jwt_config: &JwtSettings,
    app: &ApplicationSettings,
) -> Result<HttpResponse, AppError> {
    let token = sign_token(&user.id, jwt_config)?;

    let cookie = Cookie::build(JWT_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .secure(app.environment.is_production())
        .max_age(CookieDuration::days(jwt_config.cookie_expires_in_days))
        .finish();

    Ok(HttpResponse::build(status).cookie(cookie).json(json!({
        "status": "success",
        "token": token,
        "data": { "user": user.to_document()? }
    })))
}

/// bcrypt is slow on purpose; keep it off the async workers
async fn check_password(user: &User, candidate: String) -> Result<bool, AppError> {
    let user = user.clone();
    web::block(move || user.correct_password(&candidate))
        .await
        .map_err(|e| AppError::Internal(format!("Password check was cancelled: {}", e)))?
}

/// POST /api/v1/users/signup
pub async fn signup(
    body: web::Json<SignupInput>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app: web::Data<ApplicationSettings>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let user = User::insert(&pool, body.into_inner()).await?;

    AuditLog::success(AuditAction::Signup, "user", "User signed up")
        .with_user_id(user.id)
        .record();

    let url = format!("{}/me", app.base_url);
    if let Err(e) = Email::welcome(&user, &url).send(&email_client).await {
        tracing::error!(user_id = %user.id, error = %e, "Welcome email could not be sent");
    }

    create_send_token(&user, StatusCode::CREATED, &jwt_config, &app)
}

/// POST /api/v1/users/login
pub async fn login(
    body: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let (email, password) = match (body.email, body.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => return Err(AuthError::MissingCredentials.into()),
    };

    let user = match User::find_by_email(&pool, &email).await? {
        Some(user) => user,
        None => {
            AuditLog::failure(AuditAction::Login, "user", "Unknown email").record();
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !check_password(&user, password).await? {
        AuditLog::failure(AuditAction::Login, "user", "Incorrect password")
            .with_user_id(user.id)
            .record();
        return Err(AuthError::InvalidCredentials.into());
    }

    AuditLog::success(AuditAction::Login, "user", "User logged in")
        .with_user_id(user.id)
        .record();
    create_send_token(&user, StatusCode::OK, &jwt_config, &app)
}

/// GET /api/v1/users/logout
///
/// Overwrites the session cookie with a short lived dummy value.
pub async fn logout() -> HttpResponse {
    let cookie = Cookie::build(JWT_COOKIE, "loggedout")
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(10))
        .finish();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "status": "success" }))
}

/// POST /api/v1/users/forgotPassword
pub async fn forgot_password(
    body: web::Json<ForgotPasswordRequest>,
    pool: web::Data<PgPool>,
    app: web::Data<ApplicationSettings>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = body.into_inner().email.unwrap_or_default();
    let mut user = User::find_by_email(&pool, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with email address.".to_string()))?;

    let reset_token = user.create_password_reset_token();
    user.save(&pool).await?;

    let url = format!("{}/api/v1/users/resetPassword/{}", app.base_url, reset_token);
    if let Err(e) = Email::password_reset(&user, &url).send(&email_client).await {
        user.clear_password_reset_token();
        user.save(&pool).await?;

        AuditLog::failure(AuditAction::ForgotPassword, "user", "Reset email failed")
            .with_user_id(user.id)
            .record();
        return Err(e.into());
    }

    AuditLog::success(AuditAction::ForgotPassword, "user", "Reset token sent")
        .with_user_id(user.id)
        .record();

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Token sent to email!"
    })))
}

/// PATCH /api/v1/users/resetPassword/{token}
pub async fn reset_password(
    path: web::Path<String>,
    body: web::Json<ResetPasswordRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let token_hash = hash_token(&path.into_inner());
    let mut user = User::find_by_reset_token(&pool, &token_hash)
        .await?
        .ok_or(AuthError::ResetTokenInvalid)?;

    let body = body.into_inner();
    let password = body.password.unwrap_or_default();
    let confirm = body.password_confirm.unwrap_or_default();
    user = set_password_blocking(user, password, confirm).await?;
    user.save(&pool).await?;

    AuditLog::success(AuditAction::ResetPassword, "user", "Password reset")
        .with_user_id(user.id)
        .record();
    create_send_token(&user, StatusCode::OK, &jwt_config, &app)
}

/// PATCH /api/v1/users/updateMyPassword
pub async fn update_password(
    current: CurrentUser,
    body: web::Json<UpdatePasswordRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let user = current.0;

    if !check_password(&user, body.password_current.unwrap_or_default()).await? {
        AuditLog::failure(AuditAction::UpdatePassword, "user", "Wrong current password")
            .with_user_id(user.id)
            .record();
        return Err(AuthError::WrongCurrentPassword.into());
    }

    let password = body.password.unwrap_or_default();
    let confirm = body.password_confirm.unwrap_or_default();
    let user = set_password_blocking(user, password, confirm).await?;
    user.save(&pool).await?;

    AuditLog::success(AuditAction::UpdatePassword, "user", "Password updated")
        .with_user_id(user.id)
        .record();
    create_send_token(&user, StatusCode::OK, &jwt_config, &app)
}

async fn set_password_blocking(
    mut user: User,
    password: String,
    confirm: String,
) -> Result<User, AppError> {
    web::block(move || user.set_password(&password, &confirm).map(|_| user))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing was cancelled: {}", e)))?
}
