//! Book catalogue endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use xiazki_common::db::books;
use xiazki_common::db::models::{AuthorBooks, Book, NewBook};

use super::error::ApiResult;
use crate::services::AutofillMatch;
use crate::AppState;

/// GET /api/books
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<Book>>> {
    Ok(Json(books::list_books(&state.db).await?))
}

/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let Json(new_book) = payload?;
    let book = books::insert_book(&state.db, &new_book).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /api/books/:id
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> ApiResult<Json<Book>> {
    Ok(Json(books::get_book(&state.db, book_id).await?))
}

/// PUT /api/books/:id
///
/// Full replacement: name lists omitted from the body are cleared.
pub async fn update_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> ApiResult<Json<Book>> {
    let Json(new_book) = payload?;
    Ok(Json(books::update_book(&state.db, book_id, &new_book).await?))
}

/// DELETE /api/books/:id
pub async fn delete_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> ApiResult<StatusCode> {
    books::delete_book(&state.db, book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/authors/:id
pub async fn get_author(
    State(state): State<AppState>,
    Path(author_id): Path<i64>,
) -> ApiResult<Json<AuthorBooks>> {
    Ok(Json(books::list_books_by_author(&state.db, author_id).await?))
}

/// GET /api/autofill/:isbn
///
/// Book fields found by every provider that knows the ISBN; nothing is saved.
pub async fn autofill(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> ApiResult<Json<Vec<AutofillMatch>>> {
    Ok(Json(state.autofill.lookup(&isbn).await?))
}
