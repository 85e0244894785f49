//! Route handlers.
//!
//! Handlers run after admission, authentication and the permission gate;
//! they only validate payloads and drive the stores.

pub mod companies;
pub mod health;
pub mod tokens;
pub mod users;

use crate::http::response::ApiError;

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
