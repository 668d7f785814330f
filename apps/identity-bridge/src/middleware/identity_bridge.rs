//! Route guard that runs the identity bridge.
//!
//! Wrapped around protected resources. On success the `BridgedSession` is
//! placed in request extensions for the `BridgedSession` extractor; on
//! failure the error response is rendered here, inside the request's trace
//! scope, and the inner service never runs.

use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::error::AppError;
use crate::services::bridge::bridge_request;
use crate::state::app_state::AppState;

pub struct IdentityBridge;

impl<S, B> Transform<S, ServiceRequest> for IdentityBridge
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityBridgeMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityBridgeMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct IdentityBridgeMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityBridgeMiddleware<S>
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
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                let err = AppError::internal("AppState not registered");
                return Ok(req.error_response(err).map_into_right_body());
            };

            match bridge_request(req.request(), &state).await {
                Ok(session) => {
                    req.extensions_mut().insert(session);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(err) => Ok(req.error_response(err).map_into_right_body()),
            }
        })
    }
}
