use axum::{extract::State, Json};
use std::collections::BTreeMap;

use crate::api::handlers::AppState;
use crate::models::TableDescription;

/// Registry document: table name to field name to `{defaultType, type}`
pub async fn get_schema(State(state): State<AppState>) -> Json<BTreeMap<String, TableDescription>> {
    Json(state.registry.snapshot().await)
}
