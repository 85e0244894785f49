//! Per-route permission gate.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::authenticate::identity_of;
use crate::auth::Requirement;
use crate::http::response::ApiError;

/// Run the handler only when the request's identity meets `requirement`.
///
/// Mount with `axum::middleware::from_fn_with_state(requirement, require_permissions)`.
pub async fn require_permissions(
    State(requirement): State<Requirement>,
    request: Request,
    next: Next,
) -> Response {
    let decision = identity_of(&request).and_then(|identity| {
        requirement.check(identity).map_err(|denied| {
            tracing::debug!(
                identity = identity.kind(),
                required = ?requirement.codes(),
                strategy = ?requirement.strategy(),
                %denied,
                "Permission check failed"
            );
            ApiError::from(denied)
        })
    });

    match decision {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
