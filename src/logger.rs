use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use log::{info, warn};

/// Request logging middleware
///
/// One line when a request arrives (method, target, client ip) and one when
/// it leaves (status, latency). Server errors and requests rejected by an
/// inner middleware are logged at `warn`.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let target = match req.query_string() {
            "" => path.clone(),
            query => format!("{}?{}", path, query),
        };
        let client = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        info!("Request started: {} {} from {}", method, target, client);

        let service = self.service.clone();

        Box::pin(async move {
            let res = match service.call(req).await {
                Ok(res) => res,
                Err(err) => {
                    let status = err.as_response_error().status_code();
                    warn!(
                        "Request rejected: {} {} - Status: {} ({}ms)",
                        method,
                        path,
                        status.as_u16(),
                        start_time.elapsed().as_millis()
                    );
                    return Err(err);
                }
            };

            let elapsed = start_time.elapsed().as_millis();
            let status = res.status();
            if status.is_server_error() {
                warn!(
                    "Request failed: {} {} - Status: {} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    elapsed
                );
            } else {
                info!(
                    "Request completed: {} {} - Status: {} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    elapsed
                );
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn test_passes_responses_through() {
        let app = test::init_service(
            App::new()
                .wrap(LoggerMiddleware)
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().body("pong") })),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping?verbose=1").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
