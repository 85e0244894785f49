//! Response rendering.
//!
//! # Responsibilities
//! - Map every failure the service can report to one status code and message
//! - Render success and error bodies as JSON envelopes
//!
//! # Design Decisions
//! - Error bodies are `{"error": {"message": ..., "details": ...}}`
//! - 5xx bodies never carry internals; the source error is logged instead
//! - Pretty-printed JSON is a per-environment switch, not per-request

use std::error::Error as StdError;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::{AccessDenied, AuthError, TokenScope};
use crate::resources::{FieldErrors, WriteError};
use crate::store::StoreError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Every error the HTTP surface can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid {0} token")]
    InvalidCredential(TokenScope),

    #[error("unauthorized")]
    Unauthorized,

    #[error("user not activated")]
    UserNotActivated,

    #[error("forbidden")]
    Forbidden,

    #[error("record {0} not found")]
    NotFound(i64),

    #[error("route not found")]
    RouteNotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate key for `{0}`")]
    DuplicateKey(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid id: {0}")]
    InvalidId(&'static str),

    #[error("failed validation")]
    FailedValidation(FieldErrors),

    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ApiError {
    pub fn internal(context: &'static str, source: impl Into<BoxError>) -> Self {
        ApiError::Internal {
            context,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidCredential(_)
            | ApiError::Unauthorized
            | ApiError::UserNotActivated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::DuplicateKey(_) | ApiError::BadRequest(_) | ApiError::InvalidId(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::RateLimitExceeded => "Rate limit exceeded".into(),
            ApiError::InvalidCredential(scope) => {
                format!("Invalid token; please request new {scope} token")
            }
            ApiError::Unauthorized => "Unauthorized. Please try logging in again".into(),
            ApiError::UserNotActivated => {
                "User is not activated yet. Please check your email for the activation link".into()
            }
            ApiError::Forbidden => "Forbidden. Please check your permissions".into(),
            ApiError::NotFound(_) => "Could not find the record you requested".into(),
            ApiError::RouteNotFound => "Could not find the route you requested".into(),
            ApiError::MethodNotAllowed => {
                "The requested method is not allowed for this resource".into()
            }
            ApiError::EditConflict => {
                "Unable to update the record due to an edit conflict. Please try again".into()
            }
            ApiError::DuplicateKey(_) => "Duplicate key provided".into(),
            ApiError::BadRequest(_) | ApiError::FailedValidation(_) => {
                "Invalid request payload".into()
            }
            ApiError::InvalidId(_) => "Invalid ID provided".into(),
            ApiError::Internal { .. } => "There was an error processing your request".into(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::NotFound(id) => Some(json!(format!("No match for key {id}"))),
            ApiError::BadRequest(reason) => Some(json!(reason)),
            ApiError::InvalidId(reason) => Some(json!(reason)),
            ApiError::FailedValidation(errors) => Some(errors.to_json()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal { context, source } = &self {
            tracing::error!(error = %source, context, "Request failed");
        }

        let body = json!({
            "error": ErrorBody {
                message: self.message(),
                details: self.details(),
            }
        });
        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, ApiError::InvalidCredential(TokenScope::Authentication)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal("storage call failed", err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential(scope) => ApiError::InvalidCredential(scope),
            AuthError::NotFound(id) => ApiError::NotFound(id),
            AuthError::Store(err) => ApiError::internal("identity lookup failed", err),
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthorized => ApiError::Unauthorized,
            AccessDenied::Forbidden => ApiError::Forbidden,
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::EditConflict => ApiError::EditConflict,
            WriteError::DuplicateKey { constraint } => ApiError::DuplicateKey(constraint),
            WriteError::NotFound(id) => ApiError::NotFound(id),
            WriteError::Store(err) => ApiError::internal("versioned write failed", err),
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::FailedValidation(errors)
    }
}

/// A JSON success body, compact or indented.
pub struct JsonBody {
    status: StatusCode,
    body: Value,
    pretty: bool,
    location: Option<String>,
}

impl JsonBody {
    pub fn new(status: StatusCode, body: Value, pretty: bool) -> Self {
        Self {
            status,
            body,
            pretty,
            location: None,
        }
    }

    /// Point the client at a newly created record.
    pub fn with_location(mut self, path: String) -> Self {
        self.location = Some(path);
        self
    }
}

impl IntoResponse for JsonBody {
    fn into_response(self) -> Response {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&self.body)
        } else {
            serde_json::to_string(&self.body)
        };
        match rendered {
            Ok(mut text) => {
                text.push('\n');
                let mut response = (
                    self.status,
                    [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                    text,
                )
                    .into_response();
                if let Some(location) = self.location.and_then(|path| HeaderValue::try_from(path).ok()) {
                    response.headers_mut().insert(header::LOCATION, location);
                }
                response
            }
            Err(e) => ApiError::internal("response serialization failed", e).into_response(),
        }
    }
}
