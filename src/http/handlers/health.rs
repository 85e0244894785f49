use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;

use crate::http::response::JsonBody;
use crate::http::server::AppState;

pub async fn health(State(state): State<AppState>) -> JsonBody {
    state.respond(
        StatusCode::OK,
        json!({
            "health": {
                "status": "available",
                "environment": state.config.environment.to_string(),
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}
