//! Ranking endpoints
//!
//! GET /api/standing/top  - leaderboard
//! GET /api/standing/:id  - window around one word

use axum::{
    extract::{Path, State},
    Json,
};
use wrs_common::WordScore;

use super::ApiError;
use crate::AppState;

/// GET /api/standing/top
pub async fn top_ranks(State(state): State<AppState>) -> Result<Json<Vec<WordScore>>, ApiError> {
    let words = state.query.top_ranks().await?;
    Ok(Json(words))
}

/// GET /api/standing/:id
///
/// Returns 404 when the word has never been seen.
pub async fn standing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WordScore>>, ApiError> {
    let words = state.query.standing(&id).await?;
    Ok(Json(words))
}
