use std::future::{ready, Ready};
use std::rc::Rc;

use actix_service::{forward_ready, Service};
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::error::InternalError;
use actix_web::{Error, HttpResponse};
use futures::future::LocalBoxFuture;

use crate::error::{AppError, ErrorTranslator};

/// App-level middleware: every error, raised by a handler or returned by an
/// inner middleware, leaves the app as the JSON error envelope.
pub struct ErrorEnvelope {
    translator: ErrorTranslator,
}

impl ErrorEnvelope {
    pub fn new(translator: ErrorTranslator) -> Self {
        ErrorEnvelope { translator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ErrorEnvelope
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ErrorEnvelopeMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ErrorEnvelopeMiddleware {
            service: Rc::new(service),
            translator: self.translator,
        }))
    }
}

pub struct ErrorEnvelopeMiddleware<S> {
    service: Rc<S>,
    translator: ErrorTranslator,
}

/// Render any actix error. Errors not raised as `AppError` keep their status.
fn render(translator: &ErrorTranslator, err: &Error, method: &str, path: &str) -> HttpResponse {
    let converted;
    let app_err = match err.as_error::<AppError>() {
        Some(app_err) => app_err,
        None => {
            let status = err.as_response_error().status_code();
            let message = if status.is_client_error() && !err.to_string().is_empty() {
                err.to_string()
            } else {
                status.canonical_reason().unwrap_or("Error").to_string()
            };
            converted = AppError::Status { status, message };
            &converted
        }
    };

    let response = translator.render(app_err);
    if response.status().is_server_error() {
        log::error!("{method} {path} -> {}: {app_err}", response.status());
    } else {
        log::debug!("{method} {path} -> {}: {app_err}", response.status());
    }
    response
}

impl<S, B> Service<ServiceRequest> for ErrorEnvelopeMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let translator = self.translator;
        let method = req.method().to_string();
        let path = req.path().to_string();

        Box::pin(async move {
            match service.call(req).await {
                Ok(res) => {
                    let rendered = res
                        .response()
                        .error()
                        .map(|err| render(&translator, err, &method, &path));
                    match rendered {
                        Some(response) => Ok(res.into_response(response).map_into_right_body()),
                        None => Ok(res.map_into_left_body()),
                    }
                }
                // Request already consumed; the envelope travels inside the error.
                Err(err) => {
                    let response = render(&translator, &err, &method, &path);
                    Err(InternalError::from_response(err, response).into())
                }
            }
        })
    }
}
