/// Generic CRUD handlers
///
/// Every handler works against a [`Resource`] and is mounted per model,
/// e.g. `web::get().to(get_one::<Tour>)`.

use actix_web::{http::StatusCode, web, HttpResponse};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api_features::ApiFeatures;
use crate::audit::{AuditAction, AuditLog};
use crate::error::AppError;
use crate::models::{parse_id, Resource};
use crate::routes::{respond, respond_list};

/// Run the full query string pipeline, optionally scoped to a parent document
pub async fn list_documents<R: Resource>(
    pool: &PgPool,
    query: &HashMap<String, String>,
    scope: Option<(&'static str, Uuid)>,
) -> Result<Vec<Value>, AppError> {
    let mut features = ApiFeatures::<R>::new(query);
    if let Some((column, id)) = scope {
        features = features.scope(column, id);
    }

    features
        .filter()?
        .sort()?
        .limit_fields()?
        .paginate()
        .fetch(pool)
        .await
}

/// Load one document or fail with 404
pub async fn find_document<R: Resource>(pool: &PgPool, id: Uuid) -> Result<R, AppError> {
    R::find_by_id(pool, id)
        .await?
        .ok_or_else(AppError::document_not_found)
}

pub async fn create_document<R: Resource>(pool: &PgPool, input: R::Create) -> Result<R, AppError> {
    let document = R::insert(pool, input).await?;
    document.after_save(pool).await?;

    AuditLog::success(AuditAction::Create, R::SINGULAR, "Document created")
        .with_resource_id(document.id())
        .record();
    Ok(document)
}

pub async fn update_document<R: Resource>(
    pool: &PgPool,
    id: Uuid,
    patch: R::Patch,
) -> Result<R, AppError> {
    let mut document = find_document::<R>(pool, id).await?;
    document.apply(patch)?;
    document.save(pool).await?;
    document.after_save(pool).await?;

    AuditLog::success(AuditAction::Update, R::SINGULAR, "Document updated")
        .with_resource_id(id)
        .record();
    Ok(document)
}

pub async fn delete_document<R: Resource>(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let document = find_document::<R>(pool, id).await?;
    if !R::delete_by_id(pool, id).await? {
        return Err(AppError::document_not_found());
    }
    document.after_delete(pool).await?;

    AuditLog::success(AuditAction::Delete, R::SINGULAR, "Document deleted")
        .with_resource_id(id)
        .record();
    Ok(())
}

/// GET /
pub async fn get_all<R: Resource>(
    query: web::Query<HashMap<String, String>>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let documents = list_documents::<R>(&pool, &query, None).await?;
    Ok(respond_list(R::PLURAL, documents))
}

/// GET /{id}
pub async fn get_one<R: Resource>(
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let document = find_document::<R>(&pool, id).await?;
    Ok(respond(StatusCode::OK, R::SINGULAR, document.to_document()?))
}

/// POST /
pub async fn create_one<R: Resource>(
    body: web::Json<R::Create>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let document = create_document::<R>(&pool, body.into_inner()).await?;
    Ok(respond(StatusCode::CREATED, R::SINGULAR, document.to_document()?))
}

/// PATCH /{id}
pub async fn update_one<R: Resource>(
    path: web::Path<String>,
    body: web::Json<R::Patch>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let document = update_document::<R>(&pool, id, body.into_inner()).await?;
    Ok(respond(StatusCode::OK, R::SINGULAR, document.to_document()?))
}

/// DELETE /{id}
pub async fn delete_one<R: Resource>(
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    delete_document::<R>(&pool, id).await?;
    Ok(HttpResponse::NoContent().finish())
}
