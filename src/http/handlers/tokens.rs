//! Login: trade credentials for an authentication token.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::credential::{issue, ADMIN_OWNER_ID};
use crate::auth::{password, TokenScope};
use crate::http::request::JsonInput;
use crate::http::response::{ApiError, JsonBody};
use crate::http::server::AppState;
use crate::resilience::with_deadline;
use crate::resources::validation::is_email;
use crate::resources::{User, Validator};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    fn validate(&self) -> Result<(), ApiError> {
        let mut v = Validator::new();
        v.check(!self.email.is_empty(), "email", "must be provided");
        v.check(is_email(&self.email), "email", "must be a valid email address");
        v.check(!self.password.is_empty(), "password", "must be provided");
        v.finish().map_err(ApiError::from)
    }
}

pub async fn login(
    State(state): State<AppState>,
    JsonInput(input): JsonInput<LoginInput>,
) -> Result<JsonBody, ApiError> {
    input.validate()?;

    let (owner_id, is_admin) = if state.admin_login_enabled() && input.email == state.config.admin.email {
        if input.password != state.config.admin.password {
            return Err(ApiError::Unauthorized);
        }
        (ADMIN_OWNER_ID, true)
    } else {
        let user = with_deadline(
            state.deadline(),
            state.stores.users.find_unique(User::EMAIL_KEY, &input.email),
        )
        .await?
        .ok_or(ApiError::Unauthorized)?;

        let matches = password::verify(input.password, user.password_hash.clone())
            .await
            .map_err(|e| ApiError::internal("password verification failed", e))?;
        if !matches {
            return Err(ApiError::Unauthorized);
        }
        if !user.activated {
            return Err(ApiError::UserNotActivated);
        }
        (user.id, false)
    };

    let (issued, record) = issue(
        owner_id,
        state.config.tokens.authentication_ttl(),
        TokenScope::Authentication,
        is_admin,
        Utc::now(),
    );
    with_deadline(state.deadline(), state.stores.tokens.insert(record)).await?;
    tracing::info!(owner_id, admin = is_admin, "Authentication token issued");

    Ok(state.respond(StatusCode::CREATED, json!({ "auth": issued })))
}
