//! Database models

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Internal(format!("Unknown role in database: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Name lists attached to a book through a link table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Author,
    Tag,
    Translator,
    Narrator,
}

impl NameKind {
    pub const ALL: [NameKind; 4] = [
        NameKind::Author,
        NameKind::Tag,
        NameKind::Translator,
        NameKind::Narrator,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            NameKind::Author => "authors",
            NameKind::Tag => "tags",
            NameKind::Translator => "translators",
            NameKind::Narrator => "narrators",
        }
    }

    pub fn link_table(&self) -> &'static str {
        match self {
            NameKind::Author => "book_authors",
            NameKind::Tag => "book_tags",
            NameKind::Translator => "book_translators",
            NameKind::Narrator => "book_narrators",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            NameKind::Author => "author_id",
            NameKind::Tag => "tag_id",
            NameKind::Translator => "translator_id",
            NameKind::Narrator => "narrator_id",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub page_count: Option<i64>,
    pub series_name: Option<String>,
    pub series_number: Option<i64>,
    pub cover_url: Option<String>,
    pub authors: Vec<String>,
    /// Ids of `authors`, same order; used to link to an author's books
    pub author_ids: Vec<i64>,
    pub tags: Vec<String>,
    pub translators: Vec<String>,
    pub narrators: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Book {
    /// Replace one name list with `(id, name)` pairs in link order
    pub(crate) fn set_names(&mut self, kind: NameKind, names: Vec<(i64, String)>) {
        if kind == NameKind::Author {
            self.author_ids = names.iter().map(|(id, _)| *id).collect();
        }
        let names = names.into_iter().map(|(_, name)| name).collect();
        match kind {
            NameKind::Author => self.authors = names,
            NameKind::Tag => self.tags = names,
            NameKind::Translator => self.translators = names,
            NameKind::Narrator => self.narrators = names,
        }
    }
}

/// An author with every book linked to them, newest first
#[derive(Debug, Clone, Serialize)]
pub struct AuthorBooks {
    pub id: i64,
    pub name: String,
    pub books: Vec<Book>,
}

/// Book fields supplied on create/update (and produced by autofill)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewBook {
    pub title: String,
    pub summary: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub page_count: Option<i64>,
    pub series_name: Option<String>,
    pub series_number: Option<i64>,
    pub cover_url: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub translators: Vec<String>,
    pub narrators: Vec<String>,
}

impl NewBook {
    pub fn names(&self, kind: NameKind) -> &[String] {
        match kind {
            NameKind::Author => &self.authors,
            NameKind::Tag => &self.tags,
            NameKind::Translator => &self.translators,
            NameKind::Narrator => &self.narrators,
        }
    }
}

/// Reading-progress marker kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reading,
    Finished,
    Dropped,
}

/// Which slot an event occupies for a (user, book) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `reading`
    Reading,
    /// `finished` or `dropped`
    Terminal,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Reading => "reading",
            EventKind::Finished => "finished",
            EventKind::Dropped => "dropped",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            EventKind::Reading => Phase::Reading,
            EventKind::Finished | EventKind::Dropped => Phase::Terminal,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reading" => Ok(EventKind::Reading),
            "finished" => Ok(EventKind::Finished),
            "dropped" => Ok(EventKind::Dropped),
            other => Err(Error::InvalidInput(format!("Unknown event type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub date: NaiveDate,
    pub user_id: Uuid,
    pub book_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub date: NaiveDate,
}

/// A rating in 1..=10
///
/// Stored as 0 in the `reviews.rating` column when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Rating(value))
        } else {
            Err(Error::InvalidInput(format!(
                "Rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// Interpret a submitted rating where 0 means "no rating"
    pub fn from_submission(value: i64) -> Result<Option<Self>> {
        match value {
            0 => Ok(None),
            1..=10 => Ok(Some(Rating(value as u8))),
            _ => Err(Error::InvalidInput(format!(
                "Rating must be between 0 and 10, got {}",
                value
            ))),
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: i64,
    pub user_id: Uuid,
    pub book_id: i64,
    pub rating: Option<Rating>,
    pub opinion: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Review of another user, as listed on a book's opinions page
#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub username: String,
}

/// Partial review submission
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub user_id: Uuid,
    pub book_id: i64,
    pub rating: Option<Rating>,
    pub opinion: Option<String>,
}

/// Count of reviews per rating bucket 1..=10; always holds all ten keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RatingsSpread(BTreeMap<u8, i64>);

impl Default for RatingsSpread {
    fn default() -> Self {
        RatingsSpread((Rating::MIN..=Rating::MAX).map(|bucket| (bucket, 0)).collect())
    }
}

impl RatingsSpread {
    /// Set a bucket count; ratings outside 1..=10 are ignored
    pub fn set(&mut self, rating: i64, count: i64) {
        if let Some(slot) = u8::try_from(rating).ok().and_then(|r| self.0.get_mut(&r)) {
            *slot = count;
        }
    }

    pub fn get(&self, rating: u8) -> i64 {
        self.0.get(&rating).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, i64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Review aggregates for one book, relative to a viewing user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewStats {
    pub user_rating: i64,
    pub average_rating: f64,
    pub ratings_count: i64,
    pub opinions_count: i64,
    pub ratings_spread: RatingsSpread,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parse() {
        assert_eq!("reading".parse::<EventKind>().unwrap(), EventKind::Reading);
        assert_eq!("dropped".parse::<EventKind>().unwrap(), EventKind::Dropped);
        assert!(matches!("paused".parse::<EventKind>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_event_phase() {
        assert_eq!(EventKind::Reading.phase(), Phase::Reading);
        assert_eq!(EventKind::Finished.phase(), Phase::Terminal);
        assert_eq!(EventKind::Dropped.phase(), Phase::Terminal);
    }

    #[test]
    fn test_rating_submission() {
        assert_eq!(Rating::from_submission(0).unwrap(), None);
        assert_eq!(Rating::from_submission(7).unwrap().map(|r| r.value()), Some(7));
        assert!(Rating::from_submission(11).is_err());
        assert!(Rating::from_submission(-1).is_err());
        assert!(Rating::new(0).is_err());
    }

    #[test]
    fn test_spread_has_ten_buckets() {
        let mut spread = RatingsSpread::default();
        assert_eq!(spread.len(), 10);
        spread.set(8, 3);
        spread.set(0, 5);
        spread.set(42, 5);
        assert_eq!(spread.get(8), 3);
        assert_eq!(spread.iter().map(|(_, c)| c).sum::<i64>(), 3);
    }

    #[test]
    fn test_spread_serializes_with_string_keys() {
        let json = serde_json::to_value(RatingsSpread::default()).unwrap();
        assert_eq!(json["1"], 0);
        assert_eq!(json["10"], 0);
    }
}
