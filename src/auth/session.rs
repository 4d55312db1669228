/// Request authentication
///
/// A session token travels either in `Authorization: Bearer <token>` or in
/// the http-only `jwt` cookie. [`CurrentUser`] reuses the user attached by
/// the `Protect` middleware and otherwise authenticates on its own, so it
/// also works on routes outside a protected scope.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;

use crate::auth::jwt::verify_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::models::{Resource, Role, User};

pub const JWT_COOKIE: &str = "jwt";

/// Session token carried by the request, header first
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| req.cookie(JWT_COOKIE).map(|c| c.value().to_string()))
}

/// Resolve the active user a token was issued to
///
/// # Errors
/// - invalid or expired token
/// - the user no longer exists or was deactivated
/// - the password changed after the token was issued
pub async fn authenticate(
    pool: &PgPool,
    config: &JwtSettings,
    token: &str,
) -> Result<User, AppError> {
    let claims = verify_token(token, config)?;
    let user_id = claims.user_id()?;

    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(AuthError::UserNoLongerExists)?;

    if user.changed_password_after(claims.iat) {
        tracing::info!(%user_id, "Rejected token issued before password change");
        return Err(AuthError::PasswordChanged.into());
    }

    Ok(user)
}

/// 403 unless the user's role is one of `roles`
pub fn restrict_to(user: &User, roles: &[Role]) -> Result<(), AppError> {
    if roles.contains(&user.role()) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, role = %user.role, "Role not allowed");
        Err(AuthError::Forbidden.into())
    }
}

fn request_context(
    req: &HttpRequest,
) -> Result<(web::Data<PgPool>, web::Data<JwtSettings>), AppError> {
    let pool = req.app_data::<web::Data<PgPool>>().cloned();
    let jwt = req.app_data::<web::Data<JwtSettings>>().cloned();
    match (pool, jwt) {
        (Some(pool), Some(jwt)) => Ok((pool, jwt)),
        _ => Err(AppError::Internal(
            "Authentication requires the database pool and JWT settings".to_string(),
        )),
    }
}

/// The authenticated user; rejects the request with 401 otherwise
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<User>().cloned() {
            return Box::pin(async move { Ok(CurrentUser(user)) });
        }

        let token = token_from_request(req);
        let context = request_context(req);

        Box::pin(async move {
            let (pool, jwt) = context?;
            let token = token.ok_or(AuthError::MissingToken)?;
            let user = authenticate(&pool, &jwt, &token).await?;
            Ok(CurrentUser(user))
        })
    }
}

/// The logged in user if there is one; never fails
///
/// Used by the rendered pages to decide what the header shows.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl FromRequest for OptionalUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<User>().cloned() {
            return Box::pin(async move { Ok(OptionalUser(Some(user))) });
        }

        let token = req
            .cookie(JWT_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|value| value != "loggedout");
        let context = request_context(req).ok();

        Box::pin(async move {
            let user = match (token, context) {
                (Some(token), Some((pool, jwt))) => authenticate(&pool, &jwt, &token).await.ok(),
                _ => None,
            };
            Ok(OptionalUser(user))
        })
    }
}
