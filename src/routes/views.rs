/// Rendered pages
///
/// Errors raised here render as an HTML error page instead of the JSON
/// error body the API returns.

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog};
use crate::auth::OptionalUser;
use crate::error::{current_environment, AppError, AuthError, ErrorHandler};
use crate::models::{Booking, Resource, Review, Tour, User, UserPatch};
use crate::templates;

pub const BOOKING_ALERT: &str = "Your booking was successful! Please check your email for a confirmation. If your booking doesn't show up here immediately, please come back later.";

pub fn views_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(overview))
        .route("/tour/{slug}", web::get().to(tour))
        .route("/login", web::get().to(login_form))
        .route("/me", web::get().to(account))
        .route("/my-tours", web::get().to(my_tours))
        .route("/submit-user-data", web::post().to(submit_user_data));
}

/// An [`AppError`] rendered as an HTML page
#[derive(Debug)]
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(error: AppError) -> Self {
        HtmlError(error)
    }
}

impl fmt::Display for HtmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl HtmlError {
    /// What the page shows; unexpected errors stay vague in production
    pub fn message(&self) -> String {
        if current_environment().is_production() && !self.0.is_operational() {
            "Please try again later.".to_string()
        } else {
            self.0.public_message()
        }
    }
}

impl ResponseError for HtmlError {
    fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = Uuid::new_v4().to_string();
        self.0.log_error(&error_id);

        let (status, _) = self.0.error_response_for(&error_id, current_environment());
        let body = templates::page(
            "Something went wrong!",
            None,
            None,
            &templates::error_message(&self.message()),
        );
        HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body)
    }
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn logged_in(user: OptionalUser) -> Result<User, HtmlError> {
    user.0
        .ok_or_else(|| HtmlError(AppError::from(AuthError::MissingToken)))
}

/// Booking carried in the success redirect of a checkout
pub fn checkout_params(query: &HashMap<String, String>) -> Option<(Uuid, Uuid, f64)> {
    let tour = Uuid::parse_str(query.get("tour")?).ok()?;
    let user = Uuid::parse_str(query.get("user")?).ok()?;
    let price = query.get("price")?.parse::<f64>().ok()?;
    Some((tour, user, price))
}

/// Fallback for unmatched paths: JSON under `/api`, a page elsewhere
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    let error = AppError::NotFound(format!("Can't find {} on this server!", req.path()));
    if req.path().starts_with("/api") {
        error.error_response()
    } else {
        HtmlError(error).error_response()
    }
}

/// GET /
pub async fn overview(
    query: web::Query<HashMap<String, String>>,
    user: OptionalUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, HtmlError> {
    if let Some((tour_id, user_id, price)) = checkout_params(&query) {
        let booking = Booking::create_from_checkout(&pool, tour_id, user_id, price).await?;
        AuditLog::success(AuditAction::Checkout, Booking::SINGULAR, "Booking created from checkout")
            .with_resource_id(booking.id)
            .with_user_id(user_id)
            .record();

        return Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, "/"))
            .finish());
    }

    let alert = match query.get("alert").map(String::as_str) {
        Some("booking") => Some(BOOKING_ALERT),
        _ => None,
    };

    let tours = Tour::find_all(&pool).await?;
    Ok(html(templates::page(
        "All Tours",
        user.0.as_ref(),
        alert,
        &templates::overview(&tours),
    )))
}

/// GET /tour/{slug}
pub async fn tour(
    path: web::Path<String>,
    user: OptionalUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, HtmlError> {
    let tour = Tour::find_by_slug(&pool, &path)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no tour with that name.".to_string()))?;
    let reviews = Review::find_for_tour(&pool, tour.id).await?;

    let title = format!("{} Tour", tour.name);
    Ok(html(templates::page(
        &title,
        user.0.as_ref(),
        None,
        &templates::tour_detail(&tour, &reviews, user.0.as_ref()),
    )))
}

/// GET /login
pub async fn login_form(user: OptionalUser) -> HttpResponse {
    html(templates::page(
        "Log into your account",
        user.0.as_ref(),
        None,
        &templates::login_form(),
    ))
}

/// GET /me
pub async fn account(user: OptionalUser) -> Result<HttpResponse, HtmlError> {
    let user = logged_in(user)?;
    Ok(html(templates::page(
        "Your account",
        Some(&user),
        None,
        &templates::account(&user),
    )))
}

/// GET /my-tours
pub async fn my_tours(
    user: OptionalUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, HtmlError> {
    let user = logged_in(user)?;
    let tours = Tour::find_booked_by(&pool, user.id).await?;
    Ok(html(templates::page(
        "My Tours",
        Some(&user),
        None,
        &templates::overview(&tours),
    )))
}

#[derive(Deserialize)]
pub struct UserDataForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// POST /submit-user-data
pub async fn submit_user_data(
    form: web::Form<UserDataForm>,
    user: OptionalUser,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, HtmlError> {
    let mut user = logged_in(user)?;
    let form = form.into_inner();

    user.apply(UserPatch {
        name: form.name,
        email: form.email,
        ..Default::default()
    })?;
    user.save(&pool).await?;

    AuditLog::success(AuditAction::UpdateProfile, "user", "Profile updated from account page")
        .with_user_id(user.id)
        .record();

    Ok(html(templates::page(
        "Your account",
        Some(&user),
        None,
        &templates::account(&user),
    )))
}
