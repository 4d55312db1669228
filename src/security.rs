/// Security middleware module for protecting against common web attacks
/// Features:
/// - Fixed-window rate limiting per client IP on the API
/// - Security headers on every response (XSS, clickjacking, sniffing)

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::configuration::RateLimitSettings;
use crate::error::AppError;

/// Requests seen from one client in the current window
struct Window {
    started: Instant,
    count: u32,
}

/// Rate limiter manager - fixed window per client IP
///
/// A client gets `max_requests` per window; the count resets once the
/// window has elapsed. Expired windows are evicted on every check.
#[derive(Clone)]
pub struct RateLimiterManager {
    max_requests: u32,
    window: Duration,
    limiters: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiterManager {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self::with_window(settings.max_requests, Duration::from_secs(settings.window_seconds))
    }

    fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    fn tracked_clients(&self) -> usize {
        self.limiters.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Take one request from the IP's allowance, returning what is left
    pub fn check_rate_limit(&self, ip: &str) -> Result<u32, AppError> {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = self.window;
        limiters.retain(|_, w| now.duration_since(w.started) < window);

        let current = limiters.entry(ip.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if current.count >= self.max_requests {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        current.count += 1;
        Ok(self.max_requests - current.count)
    }
}

/// Socket address of the client. Forwarding headers are client supplied
/// and never used as the limiter key.
fn client_ip(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware applying a shared [`RateLimiterManager`] to every request
pub struct RateLimit {
    manager: RateLimiterManager,
}

impl RateLimit {
    pub fn new(manager: RateLimiterManager) -> Self {
        Self { manager }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RateLimitService {
            service: Rc::new(service),
            manager: self.manager.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    manager: RateLimiterManager,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req);
        let checked = self.manager.check_rate_limit(&ip);
        let limit = self.manager.max_requests();
        let service = self.service.clone();

        Box::pin(async move {
            let remaining = checked?;
            let mut res = service.call(req).await?;

            let headers = res.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(remaining),
            );
            Ok(res)
        })
    }
}

/// Security headers for HTTP responses
pub struct SecurityHeaders;

impl SecurityHeaders {
    /// Headers added to every response
    pub fn get_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            // XSS Protection
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "SAMEORIGIN"),
            ("x-xss-protection", "0"),
            ("x-dns-prefetch-control", "off"),
            // Content Security Policy (basic)
            (
                "content-security-policy",
                "default-src 'self'; img-src 'self' data:; script-src 'self' https://js.stripe.com; \
                 frame-src https://js.stripe.com; style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
                 font-src 'self' https://fonts.gstatic.com",
            ),
            // Referrer Policy (data theft protection)
            ("referrer-policy", "strict-origin-when-cross-origin"),
            // HSTS (HTTPS only)
            ("strict-transport-security", "max-age=31536000; includeSubDomains"),
        ]
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SecurityHeadersService {
            service: Rc::new(service),
        }))
    }
}

pub struct SecurityHeadersService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            for (name, value) in SecurityHeaders::get_headers() {
                headers.insert(
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                );
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{web, App, HttpResponse};

    fn settings(max_requests: u32) -> RateLimitSettings {
        RateLimitSettings {
            max_requests,
            window_seconds: 3600,
        }
    }

    #[test]
    fn test_rate_limiter_allows_initial_request() {
        let manager = RateLimiterManager::new(&settings(100));
        assert_eq!(manager.check_rate_limit("127.0.0.1").unwrap(), 99);
    }

    #[test]
    fn test_rate_limiter_blocks_after_allowance() {
        let manager = RateLimiterManager::new(&settings(3));
        for _ in 0..3 {
            assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        }

        let err = manager.check_rate_limit("10.0.0.1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Too many requests from this IP, please try again in an hour!"
        );

        // other clients keep their own allowance
        assert!(manager.check_rate_limit("10.0.0.2").is_ok());
    }

    #[test]
    fn test_allowance_is_not_refilled_within_the_window() {
        let manager = RateLimiterManager::new(&settings(2));
        assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        assert!(manager.check_rate_limit("10.0.0.1").is_ok());

        std::thread::sleep(Duration::from_millis(20));
        assert!(manager.check_rate_limit("10.0.0.1").is_err());
    }

    #[test]
    fn test_window_resets_and_expired_clients_are_evicted() {
        let manager = RateLimiterManager::with_window(1, Duration::from_millis(50));
        assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        assert!(manager.check_rate_limit("10.0.0.2").is_ok());
        assert!(manager.check_rate_limit("10.0.0.1").is_err());
        assert_eq!(manager.tracked_clients(), 2);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(manager.check_rate_limit("10.0.0.1").unwrap(), 0);
        assert_eq!(manager.tracked_clients(), 1);
    }

    #[test]
    fn test_security_headers() {
        let headers = SecurityHeaders::get_headers();
        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&"x-content-type-options"));
        assert!(names.contains(&"content-security-policy"));
    }

    #[actix_web::test]
    async fn test_middlewares_set_headers() {
        let app = actix_test::init_service(
            App::new()
                .wrap(SecurityHeaders)
                .wrap(RateLimit::new(RateLimiterManager::new(&settings(5))))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let resp = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        assert_eq!(resp.headers().get("x-ratelimit-limit").unwrap(), "5");
        assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), "4");
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "SAMEORIGIN");
    }

    #[actix_web::test]
    async fn test_forwarded_headers_do_not_reset_the_allowance() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimit::new(RateLimiterManager::new(&settings(1))))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;
        let peer: std::net::SocketAddr = "10.0.0.9:40000".parse().unwrap();

        let mut statuses = Vec::new();
        for i in 0..5 {
            let req = actix_test::TestRequest::get()
                .uri("/")
                .peer_addr(peer)
                .insert_header(("X-Forwarded-For", format!("1.2.3.{}", i)))
                .to_request();
            let status = match actix_test::try_call_service(&app, req).await {
                Ok(resp) => resp.status(),
                Err(err) => err.as_response_error().status_code(),
            };
            statuses.push(status.as_u16());
        }

        assert_eq!(statuses, vec![200, 429, 429, 429, 429]);
    }
}
