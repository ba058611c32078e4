use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{schema, table, AppState};

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/schema", get(schema::get_schema))
        .route("/api/{table}", post(table::read_rows))
        .route("/api/{table}/new", post(table::create_row))
        .route(
            "/api/{table}/{id}",
            get(table::get_row)
                .put(table::update_row)
                .delete(table::delete_row),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
