/// Authentication Middleware
///
/// Resolves the session token from the Authorization header or the `jwt`
/// cookie, loads the user behind it and injects the `User` into request
/// extensions for route handlers and `RestrictTo`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use std::rc::Rc;

use crate::auth::{authenticate, token_from_request};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Guards every route of the scope it wraps
pub struct Protect {
    pool: PgPool,
    jwt_config: JwtSettings,
}

impl Protect {
    pub fn new(pool: PgPool, jwt_config: JwtSettings) -> Self {
        Self { pool, jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Protect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ProtectService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ProtectService {
            service: Rc::new(service),
            pool: self.pool.clone(),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct ProtectService<S> {
    service: Rc<S>,
    pool: PgPool,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for ProtectService<S>
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
        let token = token_from_request(req.request());
        let service = self.service.clone();
        let pool = self.pool.clone();
        let jwt_config = self.jwt_config.clone();

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!(path = %req.path(), "Missing session token");
                    return Err(AppError::from(AuthError::MissingToken).into());
                }
            };

            match authenticate(&pool, &jwt_config, &token).await {
                Ok(user) => {
                    tracing::debug!(user_id = %user.id, role = %user.role, "Session validated");
                    req.extensions_mut().insert(user);
                    service.call(req).await
                }
                Err(e) => {
                    tracing::warn!("Authentication failed: {}", e);
                    Err(e.into())
                }
            }
        })
    }
}
