/// Tour Routes
///
/// Reading is public; writing is reserved to admins and lead guides.

use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpResponse, Scope};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;

use super::factory::{create_one, delete_one, find_document, get_all, get_one, list_documents, update_one};
use super::reviews::review_routes;
use super::{respond, respond_list};
use crate::audit::{AuditAction, AuditLog};
use crate::configuration::{JwtSettings, UploadSettings};
use crate::error::AppError;
use crate::middleware::{Protect, RestrictTo};
use crate::models::{parse_id, Resource, Role, Tour};
use crate::uploads::{read_multipart, save_tour_images, TOUR_IMAGE_FIELDS};

pub fn tours_scope(pool: &PgPool, jwt_config: &JwtSettings) -> Scope {
    web::scope("/tours")
        .route("/top-5-cheap", web::get().to(top_tours))
        .route("/tour-stats", web::get().to(tour_stats))
        .service(
            web::scope("/monthly-plan")
                .wrap(RestrictTo::new(&[Role::Admin, Role::LeadGuide, Role::Guide]))
                .wrap(Protect::new(pool.clone(), jwt_config.clone()))
                .route("/{year}", web::get().to(monthly_plan)),
        )
        .service(review_routes(
            web::scope("/{tourId}/reviews"),
            pool,
            jwt_config,
        ))
        .route("", web::get().to(get_all::<Tour>))
        .route("/{id}", web::get().to(get_one::<Tour>))
        .service(
            web::scope("")
                .wrap(RestrictTo::new(&[Role::Admin, Role::LeadGuide]))
                .wrap(Protect::new(pool.clone(), jwt_config.clone()))
                .route("", web::post().to(create_one::<Tour>))
                .route("/{id}", web::patch().to(update_one::<Tour>))
                .route("/{id}", web::delete().to(delete_one::<Tour>))
                .route("/{id}/images", web::patch().to(update_tour_images)),
        )
}

/// Query of the top-5-cheap alias; explicit alias keys win over the client's
pub fn top_tours_query(query: &HashMap<String, String>) -> HashMap<String, String> {
    let mut query = query.clone();
    query.insert("limit".to_string(), "5".to_string());
    query.insert("sort".to_string(), "-ratingsAverage,price".to_string());
    query.insert(
        "fields".to_string(),
        "name,price,ratingsAverage,summary,difficulty".to_string(),
    );
    query
}

/// GET /top-5-cheap
pub async fn top_tours(
    query: web::Query<HashMap<String, String>>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let tours = list_documents::<Tour>(&pool, &top_tours_query(&query), None).await?;
    Ok(respond_list(Tour::PLURAL, tours))
}

/// GET /tour-stats
pub async fn tour_stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let stats = Tour::stats(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "stats": stats }
    })))
}

/// GET /monthly-plan/{year}
pub async fn monthly_plan(
    path: web::Path<String>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let year = raw
        .trim()
        .parse::<i32>()
        .map_err(|_| AppError::cast("year", &raw))?;

    let plan = Tour::monthly_plan(&pool, year).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "plan": plan }
    })))
}

/// PATCH /{id}/images
///
/// Multipart with an `imageCover` file and up to three `images` files.
pub async fn update_tour_images(
    path: web::Path<String>,
    payload: Multipart,
    pool: web::Data<PgPool>,
    uploads: web::Data<UploadSettings>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let tour = find_document::<Tour>(&pool, id).await?;

    let form = read_multipart(payload, TOUR_IMAGE_FIELDS).await?;
    let cover = form.file("imageCover").map(|f| f.bytes.clone());
    let images: Vec<Vec<u8>> = form.files_named("images").map(|f| f.bytes.clone()).collect();

    let stored = save_tour_images(&uploads.image_dir(), tour.id, cover, images).await?;
    Tour::update_images(
        &pool,
        tour.id,
        stored.image_cover.as_deref(),
        stored.images.as_deref(),
    )
    .await?;

    AuditLog::success(AuditAction::Update, Tour::SINGULAR, "Tour images updated")
        .with_resource_id(tour.id)
        .record();

    let updated = find_document::<Tour>(&pool, id).await?;
    Ok(respond(StatusCode::OK, Tour::SINGULAR, updated.to_document()?))
}
