/// HTTP middleware for tellyads-api
///
/// Admin authentication: a shared secret in the `x-admin-key` header,
/// compared constant-time against every configured key so rotation works
/// (old and new key both valid during a rollout). No configured keys
/// means the admin surface is disabled, not open.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AppError;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub struct AdminAuth {
    keys: Arc<Vec<String>>,
}

impl AdminAuth {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthService {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

pub struct AdminAuthService<S> {
    service: Rc<S>,
    keys: Arc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthService<S>
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
        let keys = self.keys.clone();

        Box::pin(async move {
            if keys.is_empty() {
                return Err(AppError::Unauthorized("admin access is disabled".into()).into());
            }

            let presented = req
                .headers()
                .get(ADMIN_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    Error::from(AppError::Unauthorized("missing admin key".into()))
                })?;

            if !keys
                .iter()
                .any(|key| constant_time_compare(presented.as_bytes(), key.as_bytes()))
            {
                return Err(AppError::Unauthorized("invalid admin key".into()).into());
            }

            service.call(req).await
        })
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_equal() {
        assert!(constant_time_compare(b"secret-key", b"secret-key"));
    }

    #[test]
    fn compare_unequal_same_length() {
        assert!(!constant_time_compare(b"secret-key", b"secret-kez"));
    }

    #[test]
    fn compare_unequal_length() {
        assert!(!constant_time_compare(b"secret", b"secret-key"));
        assert!(!constant_time_compare(b"", b"x"));
    }

    #[test]
    fn compare_empty() {
        assert!(constant_time_compare(b"", b""));
    }
}
