//! Identity resolution middleware.
//!
//! Attaches exactly one [`Identity`] to every request that gets past it.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::Identity;
use crate::http::response::ApiError;
use crate::http::server::AppState;

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request.headers().get(header::AUTHORIZATION).cloned();
    let resolved = state.resolver.resolve(authorization.as_ref()).await;

    let mut response = match resolved {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => ApiError::from(err).into_response(),
    };

    // Responses differ by credential; keep shared caches from mixing them.
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// The identity attached by [`authenticate`].
pub fn identity_of(request: &Request) -> Result<&Identity, ApiError> {
    request.extensions().get::<Identity>().ok_or_else(|| {
        ApiError::internal(
            "identity missing from request",
            "authenticate middleware did not run for this route",
        )
    })
}
