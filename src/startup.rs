use actix_files as fs;
use actix_web::dev::Server;
use actix_web::{error::InternalError, middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::Settings;
use crate::email::EmailClient;
use crate::error::{set_environment, AppError};
use crate::logger::LoggerMiddleware;
use crate::payments::CheckoutClient;
use crate::routes::{
    bookings_scope, health_check, not_found, reviews_scope, tours_scope, users_scope, views_config,
};
use crate::security::{RateLimit, RateLimiterManager, SecurityHeaders};

const JSON_LIMIT_BYTES: usize = 10 * 1024;

/// Extractor failures (bad JSON, oversized body) use the API error body
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err, _req| {
            let error = AppError::BadRequest(format!("Invalid request body: {}", err));
            let response = actix_web::ResponseError::error_response(&error);
            InternalError::from_response(err, response).into()
        })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let error = AppError::BadRequest(err.to_string());
        let response = actix_web::ResponseError::error_response(&error);
        InternalError::from_response(err, response).into()
    })
}

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    configuration: Settings,
) -> Result<Server, std::io::Error> {
    set_environment(configuration.application.environment);

    let email_client = EmailClient::from_settings(&configuration.email_client)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let http_client = reqwest::Client::new();
    let checkout_client = CheckoutClient::new(&configuration.payments, http_client);
    let rate_limiter = RateLimiterManager::new(&configuration.rate_limit);

    let pool = connection.clone();
    let jwt_config = configuration.jwt.clone();

    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(configuration.jwt.clone());
    let application = web::Data::new(configuration.application.clone());
    let uploads = web::Data::new(configuration.uploads.clone());
    let email_client = web::Data::new(email_client);
    let checkout_client = web::Data::new(checkout_client);
    let public_dir = configuration.uploads.public_dir();

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(SecurityHeaders)
            .wrap(Logger::default()) // Standard logging
            .wrap(LoggerMiddleware) // Custom logging
            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(application.clone())
            .app_data(uploads.clone())
            .app_data(email_client.clone())
            .app_data(checkout_client.clone())
            .app_data(json_config())
            .app_data(path_config())
            .route("/health_check", web::get().to(health_check))
            // API, rate limited per client IP
            .service(
                web::scope("/api/v1")
                    .wrap(RateLimit::new(rate_limiter.clone()))
                    .service(tours_scope(&pool, &jwt_config))
                    .service(users_scope(&pool, &jwt_config))
                    .service(reviews_scope(&pool, &jwt_config))
                    .service(bookings_scope(&pool, &jwt_config)),
            )
            // Static assets
            .service(fs::Files::new("/css", format!("{}/css", public_dir)))
            .service(fs::Files::new("/js", format!("{}/js", public_dir)))
            .service(fs::Files::new("/img", format!("{}/img", public_dir)))
            // Rendered pages
            .configure(views_config)
            .default_service(web::to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
