/// Role Authorization Middleware
///
/// Must sit inside `Protect`: it reads the `User` that `Protect` attached
/// and rejects the request with 403 unless the role is allowed.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::restrict_to;
use crate::error::{AppError, AuthError};
use crate::models::{Role, User};

pub struct RestrictTo {
    roles: Rc<Vec<Role>>,
}

impl RestrictTo {
    pub fn new(roles: &[Role]) -> Self {
        Self {
            roles: Rc::new(roles.to_vec()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RestrictTo
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RestrictToService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RestrictToService {
            service: Rc::new(service),
            roles: self.roles.clone(),
        }))
    }
}

pub struct RestrictToService<S> {
    service: Rc<S>,
    roles: Rc<Vec<Role>>,
}

impl<S, B> Service<ServiceRequest> for RestrictToService<S>
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
        let allowed = match req.extensions().get::<User>() {
            Some(user) => restrict_to(user, &self.roles),
            None => Err(AppError::from(AuthError::MissingToken)),
        };

        let service = self.service.clone();
        Box::pin(async move {
            allowed?;
            service.call(req).await
        })
    }
}
