pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::eligibility::handlers;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Eligibility API
        .route(
            "/api/v1/eligibility/analyze",
            post(handlers::handle_analyze),
        )
        .route(
            "/api/v1/eligibility/policies",
            get(handlers::handle_list_policies),
        )
        .fallback(not_found)
        .with_state(state)
}
