use actix_web::dev::{Service, ServiceRequest, Transform};
use actix_web::error::ErrorUnauthorized;
use actix_web::{Error, HttpMessage};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Future, Ready};
use std::pin::Pin;

use crate::context::UserInfo;

/// The caller's identity as issued by the external auth service: the
/// numeric user id in `sub`, expiry in `exp`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claim {
    pub sub: i32,
    pub exp: i64,
}

pub struct Jwt {
    secret: Vec<u8>,
}

impl Jwt {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for Jwt
where
    S: Service<ServiceRequest, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Transform = JwtService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtService {
            key: DecodingKey::from_secret(&self.secret),
            next_service: service,
        }))
    }
}

pub struct JwtService<S> {
    key: DecodingKey,
    next_service: S,
}

impl<S> Service<ServiceRequest> for JwtService<S>
where
    S: Service<ServiceRequest, Error = Error>,
    S::Future: 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match req.headers().get("Authorization").and_then(|h| h.to_str().ok()) {
            Some(header) => header.trim_start_matches("Bearer ").to_owned(),
            None => return Box::pin(async move { Err(ErrorUnauthorized("no token in header")) }),
        };
        match decode::<Claim>(&token, &self.key, &Validation::new(Algorithm::HS256)) {
            Err(e) => Box::pin(async move { Err(ErrorUnauthorized(e)) }),
            Ok(data) => {
                req.extensions_mut().insert(UserInfo { id: data.claims.sub });
                Box::pin(self.next_service.call(req))
            }
        }
    }
}
