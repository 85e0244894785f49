//! User accounts: registration, activation and versioned edits.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::credential::issue;
use crate::auth::{password, PermCode, PlainToken, TokenScope};
use crate::http::request::{JsonInput, RecordId};
use crate::http::response::{ApiError, JsonBody};
use crate::http::server::AppState;
use crate::resilience::with_deadline;
use crate::resources::{
    full_update, partial_update, NewUser, User, UserChanges, UserPatch, UserReplacement,
    Validator, WriteError,
};

/// Granted to every newly registered user.
const DEFAULT_PERMISSIONS: [PermCode; 2] = [PermCode::CompaniesRead, PermCode::CompaniesWrite];

pub async fn create(
    State(state): State<AppState>,
    JsonInput(input): JsonInput<NewUser>,
) -> Result<JsonBody, ApiError> {
    let mut v = Validator::new();
    input.validate(&mut v);
    v.finish()?;

    let hashed = hash_password(&state, input.password).await?;
    let user = with_deadline(
        state.deadline(),
        state.stores.users.insert(User::new(input.name, input.email, hashed)),
    )
    .await
    .map_err(|e| ApiError::from(WriteError::from(e)))?;

    let (activation, record) = issue(
        user.id,
        state.config.tokens.activation_ttl(),
        TokenScope::Activation,
        false,
        Utc::now(),
    );
    with_deadline(state.deadline(), state.stores.tokens.insert(record)).await?;
    with_deadline(
        state.deadline(),
        state.stores.permissions.grant(user.id, &DEFAULT_PERMISSIONS),
    )
    .await?;
    tracing::info!(user_id = user.id, "User registered");

    // No mail delivery here; dev environments hand the token back directly.
    let body = if state.config.environment.is_dev() {
        json!({ "user": user, "activation": activation })
    } else {
        json!({ "user": user })
    };
    Ok(state
        .respond(StatusCode::ACCEPTED, body)
        .with_location(format!("/v1/users/{}", user.id)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationInput {
    pub token: String,
}

pub async fn activate(
    State(state): State<AppState>,
    JsonInput(input): JsonInput<ActivationInput>,
) -> Result<JsonBody, ApiError> {
    let invalid = ApiError::InvalidCredential(TokenScope::Activation);

    let token = PlainToken::from(input.token);
    if token.validate().is_err() {
        return Err(invalid);
    }

    let Some(record) = with_deadline(
        state.deadline(),
        state
            .stores
            .tokens
            .find_live(&token.digest(), TokenScope::Activation, Utc::now()),
    )
    .await?
    else {
        return Err(invalid);
    };

    let user = match partial_update(
        &*state.stores.users,
        record.owner_id,
        &UserPatch::activate(),
        state.deadline(),
    )
    .await
    {
        Ok(user) => user,
        Err(WriteError::NotFound(_)) => return Err(invalid),
        Err(e) => return Err(e.into()),
    };

    let consumed = with_deadline(
        state.deadline(),
        state
            .stores
            .tokens
            .delete_for_owner(user.id, TokenScope::Activation),
    )
    .await?;
    tracing::info!(user_id = user.id, consumed, "User activated");

    Ok(state.respond(
        StatusCode::OK,
        json!({ "message": format!("Activated user {}", user.id), "user": user }),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<JsonBody, ApiError> {
    let user = fetch(&state, id).await?;
    Ok(state.respond(StatusCode::OK, json!({ "user": user })))
}

pub async fn replace(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    JsonInput(input): JsonInput<UserReplacement>,
) -> Result<JsonBody, ApiError> {
    let current = fetch(&state, id).await?;

    let mut v = Validator::new();
    input.validate(&mut v);
    v.finish()?;

    let observed = input.version.unwrap_or(current.version);
    let hashed = hash_password(&state, input.password).await?;
    let replacement = User {
        name: input.name,
        email: input.email,
        password_hash: hashed,
        ..current
    };

    let user = full_update(
        &*state.stores.users,
        id,
        observed,
        &replacement,
        state.deadline(),
    )
    .await?;
    Ok(state.respond(StatusCode::OK, json!({ "user": user })))
}

pub async fn update(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    JsonInput(changes): JsonInput<UserChanges>,
) -> Result<JsonBody, ApiError> {
    let mut v = Validator::new();
    changes.validate(&mut v);
    v.finish()?;

    let password_hash = match changes.password {
        Some(plain) => Some(hash_password(&state, plain).await?),
        None => None,
    };
    let patch = UserPatch {
        name: changes.name,
        email: changes.email,
        password_hash,
        activated: None,
    };

    let user = partial_update(&*state.stores.users, id, &patch, state.deadline()).await?;
    Ok(state.respond(StatusCode::OK, json!({ "user": user })))
}

pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<JsonBody, ApiError> {
    if !with_deadline(state.deadline(), state.stores.users.delete(id)).await? {
        return Err(ApiError::NotFound(id));
    }
    with_deadline(state.deadline(), state.stores.permissions.revoke_all(id)).await?;
    for scope in [TokenScope::Activation, TokenScope::Authentication] {
        with_deadline(state.deadline(), state.stores.tokens.delete_for_owner(id, scope)).await?;
    }
    tracing::info!(user_id = id, "User deleted");

    Ok(state.respond(StatusCode::OK, json!({ "message": "user successfully deleted" })))
}

async fn fetch(state: &AppState, id: i64) -> Result<User, ApiError> {
    with_deadline(state.deadline(), state.stores.users.get(id))
        .await?
        .ok_or(ApiError::NotFound(id))
}

async fn hash_password(state: &AppState, plain: String) -> Result<String, ApiError> {
    password::hash(plain, state.config.security.bcrypt_cost)
        .await
        .map_err(|e| ApiError::internal("password hashing failed", e))
}
