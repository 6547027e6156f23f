//! Application errors and their translation into the JSON error envelope.
//!
//! Handlers and middleware return `AppError`. [`ErrorTranslator`] is the single
//! place that decides the status code and message clients see, by running an
//! ordered rule list where the first matching rule wins:
//!
//! 1. model validation failures, messages joined with `", "` (400)
//! 2. malformed resource ids (404)
//! 3. unique-key violations, naming field and value (400)
//! 4. expired session tokens (401)
//! 5. invalid session tokens (401)
//! 6. uploads over the size limit (400)
//! 7. uploads over the file count limit (400)
//! 8. other rejected uploads (400)
//! 9. request field validation, messages joined with `", "` (400)
//! 10. anything mentioning the image provider, with a generic message (500)
//! 11. fallback: the error's own status and public message, or 500
//!
//! With `detailed` set (non-production), the envelope also carries `stack` and
//! `originalError`.

use std::error::Error as _;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::config::UploadLimits;
use crate::db::{DbError, InvalidId};
use crate::images::{ImageHostError, UploadError};
use crate::models::ValidationErrors;
use crate::token::TokenError;

pub type AppResult<T> = Result<T, AppError>;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    MalformedToken,
    AccountNotFound,
    AccountInactive,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingToken => "No autorizado, no se proporcionó token",
            Self::MalformedToken => "No autorizado, token con formato inválido",
            Self::AccountNotFound => "No autorizado, usuario no encontrado",
            Self::AccountInactive => "Cuenta desactivada, contacta al administrador",
            Self::InvalidCredentials => "Credenciales inválidas",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthenticated: {}", .0.message())]
    Unauthenticated(AuthFailure),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Request payload checks, one message per problem.
    #[error("Invalid input: {}", .0.join(", "))]
    InvalidInput(Vec<String>),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    ImageHost(#[from] ImageHostError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An error raised by the framework itself, carrying its own status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden() -> Self {
        Self::Forbidden("No tienes permiso para realizar esta acción".to_string())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} no encontrado"))
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// The name reported as `originalError` in detailed envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "Unauthenticated",
            Self::Token(TokenError::Expired) => "TokenExpiredError",
            Self::Token(TokenError::Invalid) => "JsonWebTokenError",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::InvalidId(_) => "InvalidId",
            Self::Validation(_) => "ValidationError",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Database(DbError::Duplicate { .. }) => "DuplicateKey",
            Self::Database(DbError::Mongo(_)) => "MongoError",
            Self::Upload(_) => "UploadError",
            Self::ImageHost(_) => "ImageHostError",
            Self::BadRequest(_) => "BadRequest",
            Self::Status { .. } => "HttpError",
            Self::Internal(_) => "Internal",
        }
    }

    /// Status the error asks for when no translation rule claims it.
    fn own_status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::InvalidId(_) => StatusCode::NOT_FOUND,
            Self::Validation(_)
            | Self::InvalidInput(_)
            | Self::Upload(_)
            | Self::BadRequest(_)
            | Self::Database(DbError::Duplicate { .. }) => StatusCode::BAD_REQUEST,
            Self::Status { status, .. } => *status,
            Self::Database(DbError::Mongo(_)) | Self::ImageHost(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show when no rule rewrote it.
    fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(failure) => failure.message().to_string(),
            Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Status { message, .. } => message.clone(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }

    /// Debug rendering of the error and every source below it.
    fn trace(&self) -> String {
        let mut trace = format!("{self:?}");
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

const GENERIC_MESSAGE: &str = "Error del servidor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub status: StatusCode,
    pub message: String,
}

impl Translation {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

type RuleFn = fn(&AppError, &UploadLimits) -> Option<Translation>;

struct Rule {
    name: &'static str,
    apply: RuleFn,
}

const RULES: &[Rule] = &[
    Rule {
        name: "validation",
        apply: |err, _| match err {
            AppError::Validation(errors) => Some(Translation::new(
                StatusCode::BAD_REQUEST,
                errors.messages().join(", "),
            )),
            _ => None,
        },
    },
    Rule {
        name: "invalid_id",
        apply: |err, _| match err {
            AppError::InvalidId(InvalidId(value)) => Some(Translation::new(
                StatusCode::NOT_FOUND,
                format!("Recurso no encontrado. ID inválido: {value}"),
            )),
            _ => None,
        },
    },
    Rule {
        name: "duplicate_key",
        apply: |err, _| match err {
            AppError::Database(DbError::Duplicate { field, value }) => Some(Translation::new(
                StatusCode::BAD_REQUEST,
                format!("Ya existe un registro con {field}: {value}"),
            )),
            _ => None,
        },
    },
    Rule {
        name: "token_expired",
        apply: |err, _| match err {
            AppError::Token(TokenError::Expired) => Some(Translation::new(
                StatusCode::UNAUTHORIZED,
                "Sesión expirada, por favor inicia sesión nuevamente",
            )),
            _ => None,
        },
    },
    Rule {
        name: "token_invalid",
        apply: |err, _| match err {
            AppError::Token(TokenError::Invalid) => {
                Some(Translation::new(StatusCode::UNAUTHORIZED, "Token inválido"))
            }
            _ => None,
        },
    },
    Rule {
        name: "upload_size",
        apply: |err, limits| match err {
            AppError::Upload(UploadError::FileTooLarge) => Some(Translation::new(
                StatusCode::BAD_REQUEST,
                format!(
                    "El archivo es demasiado grande. Máximo {}MB",
                    limits.max_file_size_mb
                ),
            )),
            _ => None,
        },
    },
    Rule {
        name: "upload_count",
        apply: |err, limits| match err {
            AppError::Upload(UploadError::TooManyFiles) => Some(Translation::new(
                StatusCode::BAD_REQUEST,
                format!("Demasiados archivos. Máximo {}", limits.max_files),
            )),
            _ => None,
        },
    },
    Rule {
        name: "upload_shape",
        apply: |err, _| match err {
            AppError::Upload(upload) => {
                let message = match upload {
                    UploadError::UnsupportedType(_) => {
                        "Tipo de archivo no permitido. Usa JPG, PNG, WEBP o GIF"
                    }
                    UploadError::Empty => "No se recibió ninguna imagen",
                    _ => "Campo de archivo inesperado",
                };
                Some(Translation::new(StatusCode::BAD_REQUEST, message))
            }
            _ => None,
        },
    },
    Rule {
        name: "field_validation",
        apply: |err, _| match err {
            AppError::InvalidInput(messages) => Some(Translation::new(
                StatusCode::BAD_REQUEST,
                messages.join(", "),
            )),
            _ => None,
        },
    },
    Rule {
        name: "image_provider",
        apply: |err, _| {
            let mentions_provider = matches!(err, AppError::ImageHost(_))
                || err.to_string().to_lowercase().contains("cloudinary");
            mentions_provider.then(|| {
                Translation::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error al subir la imagen. Intenta nuevamente",
                )
            })
        },
    },
    Rule {
        name: "fallback",
        apply: |err, _| Some(Translation::new(err.own_status(), err.public_message())),
    },
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    success: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_error: Option<&'static str>,
}

/// Turns any `AppError` into the wire status and JSON envelope.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    detailed: bool,
    limits: UploadLimits,
}

impl ErrorTranslator {
    pub fn new(detailed: bool, limits: UploadLimits) -> Self {
        Self { detailed, limits }
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    /// Run the rules in order; the first that matches decides.
    pub fn translate(&self, err: &AppError) -> Translation {
        RULES
            .iter()
            .find_map(|rule| {
                (rule.apply)(err, &self.limits).inspect(|_| {
                    log::trace!("error rule {} matched {}", rule.name, err.kind());
                })
            })
            .unwrap_or_else(|| Translation::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE))
    }

    pub fn body(&self, err: &AppError) -> (StatusCode, serde_json::Value) {
        let translation = self.translate(err);
        let envelope = Envelope {
            success: false,
            error: &translation.message,
            stack: self.detailed.then(|| err.trace()),
            original_error: self.detailed.then(|| err.kind()),
        };
        let body = serde_json::to_value(&envelope).unwrap_or_else(|_| {
            serde_json::json!({ "success": false, "error": GENERIC_MESSAGE })
        });
        (translation.status, body)
    }

    pub fn render(&self, err: &AppError) -> HttpResponse {
        let (status, body) = self.body(err);
        HttpResponse::build(status).json(body)
    }
}

impl Default for ErrorTranslator {
    /// Terse output with default limits.
    fn default() -> Self {
        Self::new(false, UploadLimits::default())
    }
}

/// Fallback rendering when no `ErrorEnvelope` wraps the app.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        ErrorTranslator::default().translate(self).status
    }

    fn error_response(&self) -> HttpResponse {
        ErrorTranslator::default().render(self)
    }
}
