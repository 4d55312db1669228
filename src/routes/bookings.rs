/// Booking Routes
///
/// Any logged in user can open a checkout session; managing bookings is
/// reserved to admins and lead guides.

use actix_web::{web, HttpResponse, Scope};
use serde_json::json;
use sqlx::PgPool;

use super::factory::{create_one, delete_one, find_document, get_all, get_one, update_one};
use crate::audit::{AuditAction, AuditLog};
use crate::auth::CurrentUser;
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::AppError;
use crate::middleware::{Protect, RestrictTo};
use crate::models::{parse_id, Booking, Role, Tour};
use crate::payments::{CheckoutClient, CheckoutRequest};

pub fn bookings_scope(pool: &PgPool, jwt_config: &JwtSettings) -> Scope {
    web::scope("/bookings").service(
        web::scope("")
            .wrap(Protect::new(pool.clone(), jwt_config.clone()))
            .route("/checkout-session/{tourId}", web::get().to(checkout_session))
            .service(
                web::scope("")
                    .wrap(RestrictTo::new(&[Role::Admin, Role::LeadGuide]))
                    .route("", web::get().to(get_all::<Booking>))
                    .route("", web::post().to(create_one::<Booking>))
                    .route("/{id}", web::get().to(get_one::<Booking>))
                    .route("/{id}", web::patch().to(update_one::<Booking>))
                    .route("/{id}", web::delete().to(delete_one::<Booking>)),
            ),
    )
}

/// GET /checkout-session/{tourId}
pub async fn checkout_session(
    path: web::Path<String>,
    current: CurrentUser,
    pool: web::Data<PgPool>,
    checkout: web::Data<CheckoutClient>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let tour_id = parse_id(&path)?;
    let tour = find_document::<Tour>(&pool, tour_id).await?;

    let request = CheckoutRequest {
        tour: &tour,
        user: &current,
        base_url: &app.base_url,
    };
    let session = checkout.create_session(&request).await?;

    AuditLog::success(AuditAction::Checkout, "booking", "Checkout session created")
        .with_resource_id(tour.id)
        .with_user_id(current.id)
        .record();

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "session": session
    })))
}
