/// User Routes
///
/// Public auth endpoints first, then the routes of the logged in user,
/// then the admin-only CRUD behind `Protect` + `RestrictTo`.

use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Scope};
use futures::StreamExt;
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::auth::{forgot_password, login, logout, reset_password, signup, update_password};
use super::factory::{delete_one, get_all, get_one, update_one};
use super::respond;
use crate::audit::{AuditAction, AuditLog};
use crate::auth::CurrentUser;
use crate::configuration::{JwtSettings, UploadSettings};
use crate::error::AppError;
use crate::middleware::{Protect, RestrictTo};
use crate::models::{Resource, Role, User, UserPatch};
use crate::uploads::{read_multipart, save_user_photo, USER_PHOTO_FIELDS};

const MAX_JSON_BYTES: usize = 10 * 1024;

pub const NOT_FOR_PASSWORDS: &str =
    "This route is not for password updates. Please use /updateMyPassword.";

pub fn users_scope(pool: &PgPool, jwt_config: &JwtSettings) -> Scope {
    web::scope("/users")
        .route("/signup", web::post().to(signup))
        .route("/login", web::post().to(login))
        .route("/logout", web::get().to(logout))
        .route("/forgotPassword", web::post().to(forgot_password))
        .route("/resetPassword/{token}", web::patch().to(reset_password))
        .route("/updateMyPassword", web::patch().to(update_password))
        .route("/me", web::get().to(get_me))
        .route("/updateMe", web::patch().to(update_me))
        .route("/deleteMe", web::delete().to(delete_me))
        .service(
            web::scope("")
                .wrap(RestrictTo::new(&[Role::Admin]))
                .wrap(Protect::new(pool.clone(), jwt_config.clone()))
                .route("", web::get().to(get_all::<User>))
                .route("", web::post().to(create_user))
                .route("/{id}", web::get().to(get_one::<User>))
                .route("/{id}", web::patch().to(update_one::<User>))
                .route("/{id}", web::delete().to(delete_one::<User>)),
        )
}

/// GET /api/v1/users/me
pub async fn get_me(current: CurrentUser) -> Result<HttpResponse, AppError> {
    Ok(respond(StatusCode::OK, User::SINGULAR, current.to_document()?))
}

/// Only name, email and photo may be changed here
fn profile_patch(body: &Map<String, Value>) -> Result<UserPatch, AppError> {
    if body.contains_key("password") || body.contains_key("passwordConfirm") {
        return Err(AppError::BadRequest(NOT_FOR_PASSWORDS.to_string()));
    }

    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(UserPatch {
        name: text("name"),
        email: text("email"),
        ..Default::default()
    })
}

async fn read_json_object(mut payload: web::Payload) -> Result<Map<String, Value>, AppError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Invalid body: {}", e)))?;
        if body.len() + chunk.len() > MAX_JSON_BYTES {
            return Err(AppError::BadRequest("Request body is too large".to_string()));
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest("Expected a JSON object".to_string())),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON: {}", e))),
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// PATCH /api/v1/users/updateMe
///
/// Accepts JSON, or multipart with an optional `photo` image.
pub async fn update_me(
    req: HttpRequest,
    payload: web::Payload,
    current: CurrentUser,
    pool: web::Data<PgPool>,
    uploads: web::Data<UploadSettings>,
) -> Result<HttpResponse, AppError> {
    let mut user = current.0;

    let patch = if is_multipart(&req) {
        let form = read_multipart(Multipart::new(req.headers(), payload), USER_PHOTO_FIELDS).await?;
        let fields = form
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>();
        let mut patch = profile_patch(&fields)?;

        if let Some(photo) = form.file("photo") {
            let filename = save_user_photo(&uploads.image_dir(), user.id, photo.bytes.clone()).await?;
            patch.photo = Some(filename);
        }
        patch
    } else {
        profile_patch(&read_json_object(payload).await?)?
    };

    user.apply(patch)?;
    user.save(&pool).await?;

    AuditLog::success(AuditAction::UpdateProfile, "user", "Profile updated")
        .with_user_id(user.id)
        .record();
    Ok(respond(StatusCode::OK, User::SINGULAR, user.to_document()?))
}

/// DELETE /api/v1/users/deleteMe
pub async fn delete_me(
    current: CurrentUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    User::deactivate(&pool, current.id).await?;

    AuditLog::success(AuditAction::Deactivate, "user", "Account deactivated")
        .with_user_id(current.id)
        .record();
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/users
pub async fn create_user() -> Result<HttpResponse, AppError> {
    Err(AppError::Unsupported(
        "This route is not defined! Please use /signup instead.".to_string(),
    ))
}
