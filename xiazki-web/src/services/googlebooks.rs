//! Google Books API client used to autofill book metadata from an ISBN
//!
//! A single volume search (`?q=isbn:{isbn}`) returns everything needed; the
//! first volume's `volumeInfo` is mapped onto [`NewBook`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use xiazki_common::db::models::NewBook;

use super::{checked_isbn, http_client, parse_publish_date, send_json, BookProvider, ProviderError};

/// Volume search response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GBSearchResponse {
    #[serde(rename = "totalItems")]
    pub total_items: i64,
    pub items: Vec<GBVolume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GBVolume {
    pub id: String,
    pub volume_info: GBVolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GBVolumeInfo {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub industry_identifiers: Vec<GBIndustryIdentifier>,
    pub page_count: Option<i64>,
    pub categories: Vec<String>,
    pub image_links: Option<GBImageLinks>,
    pub language: Option<String>,
}

/// `{"type": "ISBN_13", "identifier": "9780140449136"}`
#[derive(Debug, Clone, Deserialize)]
pub struct GBIndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GBImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
}

impl GBVolumeInfo {
    fn identifier(&self, kind: &str) -> Option<String> {
        self.industry_identifiers
            .iter()
            .find(|id| id.kind == kind)
            .map(|id| id.identifier.clone())
    }
}

/// Map a volume onto book fields
pub fn to_new_book(info: &GBVolumeInfo) -> NewBook {
    // Thumbnails come back as plain http links
    let cover_url = info
        .image_links
        .as_ref()
        .and_then(|links| links.thumbnail.as_ref().or(links.small_thumbnail.as_ref()))
        .map(|url| match url.strip_prefix("http://") {
            Some(rest) => format!("https://{}", rest),
            None => url.clone(),
        });

    NewBook {
        title: info.title.clone(),
        summary: info.description.clone(),
        isbn10: info.identifier("ISBN_10"),
        isbn13: info.identifier("ISBN_13"),
        language: info.language.clone(),
        publisher: info.publisher.clone(),
        publish_date: info.published_date.as_deref().and_then(parse_publish_date),
        page_count: info.page_count.filter(|count| *count > 0),
        series_name: None,
        series_number: None,
        cover_url,
        authors: info.authors.clone(),
        tags: info.categories.clone(),
        translators: Vec::new(),
        narrators: Vec::new(),
    }
}

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksClient {
    /// `base_url` is the volumes endpoint; without an API key requests fall
    /// under Google's anonymous quota
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }
}

#[async_trait]
impl BookProvider for GoogleBooksClient {
    fn name(&self) -> &'static str {
        "googlebooks"
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Result<NewBook, ProviderError> {
        let isbn = checked_isbn(isbn)?;

        let mut query = vec![("q", format!("isbn:{}", isbn))];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        tracing::debug!(isbn = %isbn, "Querying Google Books");
        let request = self.http_client.get(&self.base_url).query(&query);
        let response: GBSearchResponse = send_json(request, &isbn).await?;

        let volume = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(isbn.clone()))?;

        let book = to_new_book(&volume.volume_info);

        tracing::info!(
            isbn = %isbn,
            volume_id = %volume.id,
            title = %book.title,
            "Retrieved book from Google Books"
        );

        Ok(book)
    }
}
