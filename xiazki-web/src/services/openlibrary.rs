//! OpenLibrary API client used to autofill book metadata from an ISBN
//!
//! An ISBN lookup touches three resources: the edition (`/isbn/{isbn}.json`),
//! the first work it belongs to, and each of its authors. The responses are
//! merged into a [`NewBook`] that the caller can review before saving.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use xiazki_common::db::models::NewBook;

use super::{checked_isbn, http_client, parse_publish_date, send_json, BookProvider, ProviderError};

const COVERS_BASE_URL: &str = "https://covers.openlibrary.org/b/id";

/// `{ "key": "/works/OL45804W" }` style reference
#[derive(Debug, Clone, Deserialize)]
pub struct OLKeyRef {
    pub key: String,
}

/// Edition record, the result of an ISBN lookup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OLEdition {
    pub title: String,
    pub isbn_10: Vec<String>,
    pub isbn_13: Vec<String>,
    pub languages: Vec<OLKeyRef>,
    pub publishers: Vec<String>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<i64>,
    pub covers: Vec<i64>,
    pub works: Vec<OLKeyRef>,
    pub authors: Vec<OLKeyRef>,
}

/// Work descriptions come either as a bare string or as a typed text object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OLText {
    Plain(String),
    Typed { value: String },
}

impl OLText {
    pub fn as_str(&self) -> &str {
        match self {
            OLText::Plain(s) => s,
            OLText::Typed { value } => value,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OLWork {
    pub title: String,
    pub description: Option<OLText>,
    pub covers: Vec<i64>,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OLAuthor {
    pub name: String,
}

fn cover_url(covers: &[i64]) -> Option<String> {
    // OpenLibrary uses -1 as a "no cover" placeholder
    covers
        .iter()
        .find(|id| **id > 0)
        .map(|id| format!("{}/{}-L.jpg", COVERS_BASE_URL, id))
}

/// Merge an edition, its work and its authors into book fields
pub fn to_new_book(edition: &OLEdition, work: Option<&OLWork>, authors: &[OLAuthor]) -> NewBook {
    let language = edition
        .languages
        .first()
        .map(|lang| lang.key.trim_start_matches("/languages/").to_string());

    NewBook {
        title: edition.title.clone(),
        summary: work
            .and_then(|w| w.description.as_ref())
            .map(|d| d.as_str().to_string()),
        isbn10: edition.isbn_10.first().cloned(),
        isbn13: edition.isbn_13.first().cloned(),
        language,
        publisher: edition.publishers.first().cloned(),
        publish_date: edition.publish_date.as_deref().and_then(parse_publish_date),
        page_count: edition.number_of_pages,
        series_name: None,
        series_number: None,
        cover_url: cover_url(&edition.covers)
            .or_else(|| work.and_then(|w| cover_url(&w.covers))),
        authors: authors
            .iter()
            .map(|a| a.name.clone())
            .filter(|name| !name.is_empty())
            .collect(),
        tags: work.map(|w| w.subjects.clone()).unwrap_or_default(),
        translators: Vec::new(),
        narrators: Vec::new(),
    }
}

/// OpenLibrary API client
pub struct OpenLibraryClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `{base_url}{path}` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying OpenLibrary");

        send_json(self.http_client.get(&url), path).await
    }
}

#[async_trait]
impl BookProvider for OpenLibraryClient {
    fn name(&self) -> &'static str {
        "openlibrary"
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Result<NewBook, ProviderError> {
        let isbn = checked_isbn(isbn)?;

        let edition: OLEdition = self.get_json(&format!("/isbn/{}.json", isbn)).await?;

        let work: Option<OLWork> = match edition.works.first() {
            Some(work_ref) => Some(self.get_json(&format!("{}.json", work_ref.key)).await?),
            None => None,
        };

        let mut authors = Vec::with_capacity(edition.authors.len());
        for author_ref in &edition.authors {
            let author: OLAuthor = self.get_json(&format!("{}.json", author_ref.key)).await?;
            authors.push(author);
        }

        let book = to_new_book(&edition, work.as_ref(), &authors);

        tracing::info!(
            isbn = %isbn,
            title = %book.title,
            authors = book.authors.len(),
            "Retrieved book from OpenLibrary"
        );

        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const EDITION_JSON: &str = r#"{
        "title": "The Odyssey",
        "isbn_10": ["0140449132"],
        "isbn_13": ["9780140449136"],
        "languages": [{"key": "/languages/eng"}],
        "publishers": ["Penguin Classics", "Penguin"],
        "publish_date": "Apr 29, 2003",
        "number_of_pages": 416,
        "covers": [-1, 12345],
        "works": [{"key": "/works/OL61982W"}],
        "authors": [{"key": "/authors/OL12345A"}],
        "revision": 12
    }"#;

    const WORK_JSON: &str = r#"{
        "title": "Odyssey",
        "description": {"type": "/type/text", "value": "Odysseus sails home."},
        "covers": [999],
        "subjects": ["Epic poetry", "Odysseus"]
    }"#;

    #[test]
    fn test_maps_edition_work_and_authors() {
        let edition: OLEdition = serde_json::from_str(EDITION_JSON).unwrap();
        let work: OLWork = serde_json::from_str(WORK_JSON).unwrap();
        let authors = vec![OLAuthor { name: "Homer".to_string() }];

        let book = to_new_book(&edition, Some(&work), &authors);

        assert_eq!(book.title, "The Odyssey");
        assert_eq!(book.summary.as_deref(), Some("Odysseus sails home."));
        assert_eq!(book.isbn10.as_deref(), Some("0140449132"));
        assert_eq!(book.isbn13.as_deref(), Some("9780140449136"));
        assert_eq!(book.language.as_deref(), Some("eng"));
        assert_eq!(book.publisher.as_deref(), Some("Penguin Classics"));
        assert_eq!(book.publish_date, NaiveDate::from_ymd_opt(2003, 4, 29));
        assert_eq!(book.page_count, Some(416));
        assert_eq!(
            book.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/12345-L.jpg")
        );
        assert_eq!(book.authors, vec!["Homer"]);
        assert_eq!(book.tags, vec!["Epic poetry", "Odysseus"]);
    }

    #[test]
    fn test_falls_back_to_work_cover_and_plain_description() {
        let edition: OLEdition = serde_json::from_str(r#"{"title": "Emma"}"#).unwrap();
        let work: OLWork =
            serde_json::from_str(r#"{"description": "A comedy of manners.", "covers": [42]}"#)
                .unwrap();

        let book = to_new_book(&edition, Some(&work), &[]);

        assert_eq!(book.summary.as_deref(), Some("A comedy of manners."));
        assert_eq!(book.cover_url.as_deref(), Some("https://covers.openlibrary.org/b/id/42-L.jpg"));
        assert!(book.authors.is_empty());
        assert_eq!(book.publish_date, None);
    }

    #[test]
    fn test_edition_without_work() {
        let edition: OLEdition = serde_json::from_str(r#"{"title": "Pamphlet"}"#).unwrap();
        let book = to_new_book(&edition, None, &[]);

        assert_eq!(book.summary, None);
        assert_eq!(book.cover_url, None);
        assert!(book.tags.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_isbn_rejected_before_request() {
        // Unroutable base URL: the request must never be sent
        let client = OpenLibraryClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let result = client.fetch_by_isbn("1234567890").await;
        assert!(matches!(result, Err(ProviderError::InvalidIsbn(_))));
    }
}
