//! Structured request logging middleware
//!
//! Logs method, path, status, and latency for every request through
//! `tracing`, tagged with the request id when one is present.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

#[derive(Clone, Default)]
pub struct Logging;

impl<S, B> Transform<S, ServiceRequest> for Logging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggingService { service }))
    }
}

pub struct LoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoggingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().to_string();
        let path = req.path().to_string();
        let request_id = req.extensions().get::<String>().cloned();
        let start = Instant::now();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let elapsed_ms = start.elapsed().as_millis();
            let status = res.status().as_u16();

            if status >= 500 {
                tracing::error!(
                    method = %method,
                    path = %path,
                    status = status,
                    elapsed_ms = elapsed_ms as u64,
                    request_id = request_id.as_deref().unwrap_or("-"),
                    "request failed"
                );
            } else {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status,
                    elapsed_ms = elapsed_ms as u64,
                    request_id = request_id.as_deref().unwrap_or("-"),
                    "request completed"
                );
            }

            Ok(res)
        })
    }
}
