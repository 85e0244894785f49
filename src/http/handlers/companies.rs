//! Companies: create, read, and versioned edits.

use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;

use crate::http::request::{JsonInput, RecordId};
use crate::http::response::{ApiError, JsonBody};
use crate::http::server::AppState;
use crate::resilience::with_deadline;
use crate::resources::{
    full_update, partial_update, Company, CompanyPatch, CompanyReplacement, NewCompany,
    Validator, WriteError,
};

pub async fn create(
    State(state): State<AppState>,
    JsonInput(input): JsonInput<NewCompany>,
) -> Result<JsonBody, ApiError> {
    let company = Company::from(input);
    let mut v = Validator::new();
    company.validate(&mut v);
    v.finish()?;

    let company = with_deadline(state.deadline(), state.stores.companies.insert(company))
        .await
        .map_err(|e| ApiError::from(WriteError::from(e)))?;
    tracing::info!(company_id = company.id, "Company created");

    Ok(state
        .respond(StatusCode::CREATED, json!({ "company": company }))
        .with_location(format!("/v1/companies/{}", company.id)))
}

pub async fn read(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<JsonBody, ApiError> {
    let company = fetch(&state, id).await?;
    Ok(state.respond(StatusCode::OK, json!({ "company": company })))
}

/// Full replacement. The body's `version`, when present, is the version the
/// caller last saw; otherwise the version fetched here is used.
pub async fn replace(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    JsonInput(input): JsonInput<CompanyReplacement>,
) -> Result<JsonBody, ApiError> {
    let current = fetch(&state, id).await?;
    let observed = input.version.unwrap_or(current.version);
    let replacement = input.replace(current);

    let mut v = Validator::new();
    replacement.validate(&mut v);
    v.finish()?;

    let company = full_update(
        &*state.stores.companies,
        id,
        observed,
        &replacement,
        state.deadline(),
    )
    .await?;
    Ok(state.respond(StatusCode::OK, json!({ "company": company })))
}

pub async fn update(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    JsonInput(patch): JsonInput<CompanyPatch>,
) -> Result<JsonBody, ApiError> {
    let mut v = Validator::new();
    patch.validate(&mut v);
    v.finish()?;

    let company = partial_update(&*state.stores.companies, id, &patch, state.deadline()).await?;
    Ok(state.respond(StatusCode::OK, json!({ "company": company })))
}

pub async fn delete(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<JsonBody, ApiError> {
    if !with_deadline(state.deadline(), state.stores.companies.delete(id)).await? {
        return Err(ApiError::NotFound(id));
    }
    tracing::info!(company_id = id, "Company deleted");
    Ok(state.respond(StatusCode::OK, json!({ "message": "company successfully deleted" })))
}

async fn fetch(state: &AppState, id: i64) -> Result<Company, ApiError> {
    with_deadline(state.deadline(), state.stores.companies.get(id))
        .await?
        .ok_or(ApiError::NotFound(id))
}
