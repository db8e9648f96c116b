use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/books", get(handlers::get_books))
        // Recommendations
        .route("/recommendations", post(handlers::recommend))
        .route("/users/:user_id/assignment", get(handlers::get_assignment))
        // Experiment logs
        .route("/impressions", get(handlers::get_impressions))
        .route(
            "/outcomes",
            get(handlers::get_outcomes).post(handlers::create_outcome),
        )
        .route("/experiment/summary", get(handlers::get_summary))
        // Reference data
        .route("/checkouts", post(handlers::add_checkouts))
        .layer(
            // request id is assigned before the trace span is opened
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
