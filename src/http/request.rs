//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and carry it into the trace span
//! - Decode JSON bodies strictly: one value, no unknown fields
//! - Parse positive record ids from the path
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size limits enforced by the layer stack before decoding

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use serde::de::DeserializeOwned;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

use super::response::ApiError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Mints a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Span for one request, tagged with its request ID.
pub fn request_span(request: &axum::http::Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Strict JSON body.
#[derive(Debug)]
pub struct JsonInput<T>(pub T);

impl<T, S> FromRequest<S> for JsonInput<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        decode_json(&bytes).map(JsonInput)
    }
}

/// Decode exactly one JSON value of type `T` from `bytes`.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Body must not be empty".into()));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut de).map_err(describe_json_error)?;
    de.end()
        .map_err(|_| ApiError::BadRequest("Body must only contain a single JSON value".into()))?;
    Ok(value)
}

fn describe_json_error(err: serde_json::Error) -> ApiError {
    use serde_json::error::Category;

    let reason = match err.classify() {
        Category::Syntax => format!("Body contains badly-formed JSON (at column {})", err.column()),
        Category::Eof => "Body contains badly-formed JSON".to_string(),
        Category::Data => format!("Body does not match the expected shape: {err}"),
        Category::Io => format!("Body could not be read: {err}"),
    };
    ApiError::BadRequest(reason)
}

/// A positive record id taken from the `{id}` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.parse::<i64>() {
            Err(_) => Err(ApiError::InvalidId("Int is required")),
            Ok(id) if id < 0 => Err(ApiError::InvalidId("Negative ids are not allowed")),
            Ok(0) => Err(ApiError::InvalidId("0 is not allowed")),
            Ok(id) => Ok(RecordId(id)),
        }
    }
}

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        RecordId::parse(&raw)
    }
}
