//! Reading-event endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use xiazki_common::db::models::{Event, EventKind, NewEvent};
use xiazki_common::db::{books, events};
use xiazki_common::Error;

use super::auth::CurrentUser;
use super::error::ApiResult;
use crate::AppState;

/// Raw event submission; `type` and `date` are validated here, not by serde,
/// so bad values come back as a JSON 400
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
}

impl CreateEventRequest {
    fn parse(&self) -> Result<NewEvent, Error> {
        let kind: EventKind = self.kind.trim().parse()?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            Error::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", self.date))
        })?;
        Ok(NewEvent { kind, date })
    }
}

/// GET /api/books/:id/events
///
/// The caller's events for a book, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
) -> ApiResult<Json<Vec<Event>>> {
    books::get_book(&state.db, book_id).await?;
    Ok(Json(events::list_events(&state.db, book_id, current.user.id).await?))
}

/// POST /api/books/:id/events
///
/// 409 when the new event contradicts the caller's existing ones.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let Json(request) = payload?;
    let new_event = request.parse()?;

    let event = events::insert_event(&state.db, book_id, current.user.id, new_event).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// DELETE /api/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(event_id): Path<i64>,
) -> ApiResult<StatusCode> {
    events::delete_event(&state.db, event_id, current.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, date: &str) -> CreateEventRequest {
        CreateEventRequest { kind: kind.to_string(), date: date.to_string() }
    }

    #[test]
    fn test_parse_valid_request() {
        let event = request("finished", "2024-05-10").parse().unwrap();
        assert_eq!(event.kind, EventKind::Finished);
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    }

    #[test]
    fn test_parse_rejects_unknown_type_and_bad_date() {
        assert!(matches!(request("paused", "2024-05-10").parse(), Err(Error::InvalidInput(_))));
        assert!(matches!(request("reading", "10/05/2024").parse(), Err(Error::InvalidInput(_))));
    }
}
