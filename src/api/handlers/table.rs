use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{DeleteOptions, ReadOptions, Row, TableDescription, UpdateOptions, WhereFilter};

/// Look up a table in the registry; unknown tables are 404s
async fn table_description(state: &AppState, table: &str) -> Result<TableDescription, AppError> {
    state
        .registry
        .get(table)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Table {} not found", table)))
}

/// Reject columns the table does not have
fn check_columns<S: AsRef<str>>(
    description: &TableDescription,
    table: &str,
    columns: impl IntoIterator<Item = S>,
) -> Result<(), AppError> {
    for column in columns {
        let column = column.as_ref();
        if !description.contains(column) {
            return Err(AppError::Validation(format!(
                "Unknown field {} for table {}",
                column, table
            )));
        }
    }
    Ok(())
}

/// Read rows. Without an explicit field list, binary columns are left out.
pub async fn read_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(mut options): Json<ReadOptions>,
) -> Result<Json<serde_json::Value>, AppError> {
    let description = table_description(&state, &table).await?;

    if let Some(filter) = &options.filter {
        check_columns(&description, &table, filter.iter().map(|(field, _)| field))?;
    }
    // Malformed entries are left for the query builder to reject
    let order_fields = options
        .order_by
        .iter()
        .flatten()
        .filter_map(|entry| entry.split_whitespace().next());
    check_columns(&description, &table, order_fields)?;

    let explicit_fields = options.fields.as_ref().is_some_and(|fields| !fields.is_empty());
    if explicit_fields {
        check_columns(&description, &table, options.fields.iter().flatten())?;
    } else {
        options.fields = state.registry.display_fields(&table).await;
    }

    let rows = state.driver.read(&table, &options).await?;
    tracing::debug!("Read {} rows from {}", rows.len(), table);

    Ok(Json(json!({
        "rows": rows,
        "count": rows.len()
    })))
}

/// Get a single row by id
pub async fn get_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<Json<Row>, AppError> {
    table_description(&state, &table).await?;

    let mut options = ReadOptions::new().filter(WhereFilter::new().eq("id", id)).limit(1);
    options.fields = state.registry.display_fields(&table).await;

    state
        .driver
        .read(&table, &options)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Row {} not found in {}", id, table)))
}

/// Insert a row
pub async fn create_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(data): Json<Row>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let description = table_description(&state, &table).await?;
    check_columns(&description, &table, data.keys())?;

    state.driver.create(&table, &data).await?;
    tracing::info!("Created row in {}", table);

    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

/// Update a row by id
pub async fn update_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Json(data): Json<Row>,
) -> Result<Json<serde_json::Value>, AppError> {
    let description = table_description(&state, &table).await?;
    check_columns(&description, &table, data.keys())?;

    let updated = state
        .driver
        .update(&table, &data, &UpdateOptions::filter(WhereFilter::new().eq("id", id)))
        .await?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Row {} not found in {}", id, table)));
    }

    Ok(Json(json!({ "updated": updated })))
}

/// Delete a row by id
pub async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
) -> Result<Json<serde_json::Value>, AppError> {
    table_description(&state, &table).await?;

    let deleted = state
        .driver
        .delete(&table, &DeleteOptions::filter(WhereFilter::new().eq("id", id)))
        .await?;

    if deleted == 0 {
        return Err(AppError::NotFound(format!("Row {} not found in {}", id, table)));
    }

    Ok(Json(json!({ "deleted": deleted })))
}
