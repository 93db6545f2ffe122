//! Review, rating and statistics endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use xiazki_common::db::models::{Rating, Review, ReviewStats, ReviewUpdate, ReviewWithAuthor};
use xiazki_common::db::{books, reviews};

use super::auth::CurrentUser;
use super::error::ApiResult;
use crate::AppState;

/// Partial review; absent fields (and a rating of 0) keep the stored value
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewRequest {
    pub rating: Option<i64>,
    pub opinion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct OpinionsResponse {
    /// The caller's own review, if any
    pub own: Option<Review>,
    pub others: Vec<ReviewWithAuthor>,
}

/// POST /api/books/:id/review
pub async fn submit_review(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<Json<Review>> {
    let Json(request) = payload?;

    let rating = match request.rating {
        Some(value) => Rating::from_submission(value)?,
        None => None,
    };
    let update = ReviewUpdate {
        user_id: current.user.id,
        book_id,
        rating,
        opinion: request.opinion.map(|o| o.trim().to_string()),
    };

    Ok(Json(reviews::insert_or_update_review(&state.db, &update).await?))
}

/// POST /api/books/:id/rating
///
/// Rating-only shortcut; responds with the refreshed statistics.
pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
    payload: Result<Json<RatingRequest>, JsonRejection>,
) -> ApiResult<Json<ReviewStats>> {
    let Json(request) = payload?;

    let update = ReviewUpdate {
        user_id: current.user.id,
        book_id,
        rating: Rating::from_submission(request.rating)?,
        opinion: None,
    };
    reviews::insert_or_update_review(&state.db, &update).await?;

    Ok(Json(reviews::compute_stats(&state.db, book_id, current.user.id).await?))
}

/// GET /api/books/:id/opinions
pub async fn list_opinions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
) -> ApiResult<Json<OpinionsResponse>> {
    books::get_book(&state.db, book_id).await?;

    let own = reviews::get_user_review(&state.db, book_id, current.user.id).await?;
    let others = reviews::list_other_reviews(&state.db, book_id, current.user.id).await?;

    Ok(Json(OpinionsResponse { own, others }))
}

/// GET /api/books/:id/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
) -> ApiResult<Json<ReviewStats>> {
    books::get_book(&state.db, book_id).await?;
    Ok(Json(reviews::compute_stats(&state.db, book_id, current.user.id).await?))
}
