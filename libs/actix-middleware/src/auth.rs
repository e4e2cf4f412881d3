//! JWT bearer authentication middleware
//!
//! Validates the Authorization header and stores the authenticated user id
//! in the request extensions as `UserId`. Requests without an Authorization
//! header pass through unauthenticated; route-level extractors decide
//! whether that is acceptable (WebSocket upgrades authenticate via query
//! token instead, since browsers cannot set headers on upgrade requests).

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use error_types::{error_codes, ErrorResponse};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use uuid::Uuid;

/// Authenticated user id, inserted into request extensions on success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// JWT claims issued by the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (UUID string)
    pub sub: String,
    /// Expiry, seconds since epoch
    pub exp: u64,
    /// Issued-at, seconds since epoch
    pub iat: u64,
}

/// Decode and validate a token against the shared HS256 secret.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[derive(Clone)]
pub struct JwtAuth {
    secret: Rc<String>,
}

impl JwtAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Rc::new(secret.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthService {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtAuthService<S> {
    service: Rc<S>,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let secret = self.secret.clone();

        let bearer = req
            .headers()
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string());

        Box::pin(async move {
            if let Some(token) = bearer {
                match decode_token(&secret, &token) {
                    Ok(claims) => match Uuid::parse_str(&claims.sub) {
                        Ok(user_id) => {
                            req.extensions_mut().insert(UserId(user_id));
                        }
                        Err(_) => {
                            return Ok(req.into_response(unauthorized(error_codes::TOKEN_INVALID)));
                        }
                    },
                    Err(e) => {
                        let code = match e.kind() {
                            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                                error_codes::TOKEN_EXPIRED
                            }
                            _ => error_codes::TOKEN_INVALID,
                        };
                        return Ok(req.into_response(unauthorized(code)));
                    }
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

fn unauthorized<B>(code: &str) -> HttpResponse<EitherBody<B>> {
    let body = ErrorResponse::new(
        "UnauthorizedError",
        "invalid or expired token",
        401,
        "UnauthorizedError",
        code,
    );
    HttpResponse::Unauthorized()
        .json(body)
        .map_into_right_body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret-key-min-32-chars-long!!!";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn make_token(sub: &str, iat: u64, exp: u64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            iat,
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .expect("Failed to encode JWT")
    }

    #[test]
    fn test_decode_valid_token() {
        let user = Uuid::new_v4();
        let token = make_token(&user.to_string(), now(), now() + 3600);

        let claims = decode_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user.to_string());
    }

    #[test]
    fn test_decode_expired_token() {
        let user = Uuid::new_v4();
        let token = make_token(&user.to_string(), now() - 1000, now() - 100);

        let err = decode_token(SECRET, &token).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn test_decode_wrong_secret() {
        let user = Uuid::new_v4();
        let token = make_token(&user.to_string(), now(), now() + 3600);

        assert!(decode_token("some-other-secret-32-chars-long!!", &token).is_err());
    }

    #[test]
    fn test_decode_malformed_token() {
        assert!(decode_token(SECRET, "invalid.token.format").is_err());
    }
}
