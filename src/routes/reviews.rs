/// Review Routes
///
/// Mounted at `/api/v1/reviews` and nested under
/// `/api/v1/tours/{tourId}/reviews`. Every route requires a login.

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Scope};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::factory::{create_document, delete_document, get_one, list_documents, update_document};
use super::{respond, respond_list};
use crate::auth::{restrict_to, CurrentUser};
use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::middleware::Protect;
use crate::models::{parse_id, Resource, Review, ReviewInput, Role};

pub fn reviews_scope(pool: &PgPool, jwt_config: &JwtSettings) -> Scope {
    review_routes(web::scope("/reviews"), pool, jwt_config)
}

/// Register the review routes on `scope`
pub fn review_routes(scope: Scope, pool: &PgPool, jwt_config: &JwtSettings) -> Scope {
    scope.service(
        web::scope("")
            .wrap(Protect::new(pool.clone(), jwt_config.clone()))
            .route("", web::get().to(get_reviews))
            .route("", web::post().to(create_review))
            .route("/{id}", web::get().to(get_one::<Review>))
            .route("/{id}", web::patch().to(update_review))
            .route("/{id}", web::delete().to(delete_review)),
    )
}

/// The parent tour when mounted under `/tours/{tourId}/reviews`
fn parent_tour(req: &HttpRequest) -> Result<Option<Uuid>, AppError> {
    req.match_info().get("tourId").map(parse_id).transpose()
}

/// GET / (all reviews, or the reviews of one tour)
pub async fn get_reviews(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let scope = parent_tour(&req)?.map(|tour_id| ("reviews.tour_id", tour_id));
    let reviews = list_documents::<Review>(&pool, &query, scope).await?;
    Ok(respond_list(Review::PLURAL, reviews))
}

/// POST /
///
/// Only plain users review. The tour comes from the path when nested and
/// the author is always the logged in user.
pub async fn create_review(
    req: HttpRequest,
    current: CurrentUser,
    body: web::Json<ReviewInput>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    restrict_to(&current, &[Role::User])?;

    let mut input = body.into_inner();
    if let Some(tour_id) = parent_tour(&req)? {
        input.tour = Some(tour_id);
    }
    input.user = Some(current.id);

    let review = create_document::<Review>(&pool, input).await?;
    Ok(respond(StatusCode::CREATED, Review::SINGULAR, review.to_document()?))
}

/// PATCH /{id}
pub async fn update_review(
    path: web::Path<String>,
    current: CurrentUser,
    body: web::Json<ReviewInput>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    restrict_to(&current, &[Role::User, Role::Admin])?;

    let id = parse_id(&path)?;
    let review = update_document::<Review>(&pool, id, body.into_inner()).await?;
    Ok(respond(StatusCode::OK, Review::SINGULAR, review.to_document()?))
}

/// DELETE /{id}
pub async fn delete_review(
    path: web::Path<String>,
    current: CurrentUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    restrict_to(&current, &[Role::User, Role::Admin])?;

    let id = parse_id(&path)?;
    delete_document::<Review>(&pool, id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_parent_tour_from_path() {
        let tour_id = Uuid::new_v4();
        let req = TestRequest::default()
            .param("tourId", tour_id.to_string())
            .to_http_request();
        assert_eq!(parent_tour(&req).unwrap(), Some(tour_id));
    }

    #[test]
    fn test_parent_tour_absent_or_malformed() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(parent_tour(&req).unwrap(), None);

        let req = TestRequest::default()
            .param("tourId", "not-an-id")
            .to_http_request();
        let err = parent_tour(&req).unwrap_err();
        assert_eq!(err.to_string(), "Invalid id: not-an-id.");
    }
}
