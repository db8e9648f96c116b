use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        BookId, CatalogEntry, CheckoutEvent, ImpressionLogEntry, OutcomeEvent, StrategyAssignment,
        StrategySummary, UserId,
    },
    services::presentation::{present_or_fallback, PresentationContext},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    /// Values of zero or below yield an empty list
    pub k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendedBook {
    pub book_id: BookId,
    pub title: String,
    pub librarian_pick: bool,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub strategy_name: String,
    pub assignment_id: Uuid,
    pub recommendations: Vec<RecommendedBook>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    pub user_id: String,
    pub book_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCheckoutsRequest {
    pub events: Vec<CheckoutEvent>,
}

#[derive(Debug, Serialize)]
pub struct AddCheckoutsResponse {
    pub checkouts: usize,
    pub transitions: u64,
}

fn parse_user(raw: &str) -> AppResult<UserId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
    }
    Ok(UserId(trimmed.to_string()))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Get the catalog
pub async fn get_books(State(state): State<AppState>) -> Json<Vec<CatalogEntry>> {
    let data = state.experiment.reference_store().snapshot();
    Json(data.catalog().entries().to_vec())
}

/// Recommend books through the user's assigned strategy
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = parse_user(&request.user_id)?;

    let recommendation = match request.k {
        Some(k) => {
            let k = usize::try_from(k.max(0)).unwrap_or(0);
            state.experiment.recommend(&user_id, k)?
        }
        None => state.experiment.recommend_default(&user_id)?,
    };

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        strategy = %recommendation.assignment.strategy_name,
        count = recommendation.items.len(),
        "Recommendation request handled"
    );

    // The impression is already logged; presentation cannot change it.
    let data = state.experiment.reference_store().snapshot();
    let context = PresentationContext::build(
        &user_id,
        &recommendation.items,
        data.history(&user_id),
        data.catalog(),
    );
    let message = present_or_fallback(state.presenter.as_ref(), context.clone()).await;

    let recommendations = context
        .books
        .into_iter()
        .map(|book| RecommendedBook {
            book_id: book.book_id,
            title: book.title,
            librarian_pick: book.librarian_pick,
            score: book.score,
        })
        .collect();

    Ok(Json(RecommendationResponse {
        user_id,
        strategy_name: recommendation.assignment.strategy_name,
        assignment_id: recommendation.assignment.assignment_id,
        recommendations,
        message,
    }))
}

/// Get the user's live strategy assignment
pub async fn get_assignment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<StrategyAssignment>> {
    let user_id = parse_user(&user_id)?;
    state
        .experiment
        .current_assignment(&user_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no live assignment for user {}", user_id)))
}

/// Get the impression log
pub async fn get_impressions(State(state): State<AppState>) -> Json<Vec<ImpressionLogEntry>> {
    Json(state.experiment.impressions())
}

/// Record a borrow that followed a recommendation
pub async fn create_outcome(
    State(state): State<AppState>,
    Json(request): Json<OutcomeRequest>,
) -> AppResult<(StatusCode, Json<OutcomeEvent>)> {
    let user_id = parse_user(&request.user_id)?;
    let book_id = request.book_id.trim();
    if book_id.is_empty() {
        return Err(AppError::InvalidInput("book_id must not be empty".to_string()));
    }

    let event = state
        .experiment
        .record_outcome(&user_id, BookId(book_id.to_string()));
    Ok((StatusCode::CREATED, Json(event)))
}

/// Get the outcome log
pub async fn get_outcomes(State(state): State<AppState>) -> Json<Vec<OutcomeEvent>> {
    Json(state.experiment.outcomes())
}

/// Per-strategy experiment counts
pub async fn get_summary(State(state): State<AppState>) -> Json<Vec<StrategySummary>> {
    Json(state.experiment.summary())
}

/// Append checkouts and swap in rebuilt reference tables
pub async fn add_checkouts(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<AddCheckoutsRequest>,
) -> AppResult<Json<AddCheckoutsResponse>> {
    if request
        .events
        .iter()
        .any(|event| event.user_id.0.is_empty() || event.book_id.0.is_empty())
    {
        return Err(AppError::InvalidInput(
            "checkout events need a user_id and book_id".to_string(),
        ));
    }

    let added = request.events.len();
    let data = state
        .experiment
        .reference_store()
        .append_checkouts(request.events);

    tracing::info!(
        request_id = %request_id,
        added,
        checkouts = data.checkouts().len(),
        "Reference data rebuilt"
    );

    Ok(Json(AddCheckoutsResponse {
        checkouts: data.checkouts().len(),
        transitions: data.transitions().total_transitions(),
    }))
}
