//! Outbound book metadata providers used by ISBN autofill
//!
//! Each provider maps one remote catalogue onto [`NewBook`]. [`Autofill`]
//! queries every configured provider concurrently and keeps whatever they
//! find; a failing provider is logged and skipped.

pub mod googlebooks;
pub mod openlibrary;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use xiazki_common::config::ServerConfig;
use xiazki_common::db::models::NewBook;
use xiazki_common::isbn::{is_valid_isbn, normalize_isbn};

use googlebooks::GoogleBooksClient;
use openlibrary::OpenLibraryClient;

const USER_AGENT: &str = concat!("xiazki/", env!("CARGO_PKG_VERSION"));

/// Metadata provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("No match for {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// A remote catalogue that can describe a book from its ISBN
#[async_trait]
pub trait BookProvider: Send + Sync {
    /// Short identifier reported alongside each match
    fn name(&self) -> &'static str;

    /// Look up book metadata by ISBN-10 or ISBN-13
    async fn fetch_by_isbn(&self, isbn: &str) -> Result<NewBook, ProviderError>;
}

/// Normalise an ISBN and reject it before any request is made
pub(crate) fn checked_isbn(isbn: &str) -> Result<String, ProviderError> {
    let isbn = normalize_isbn(isbn);
    if !is_valid_isbn(&isbn) {
        return Err(ProviderError::InvalidIsbn(isbn));
    }
    Ok(isbn)
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NetworkError(e.to_string()))
}

/// Send a request and decode its JSON body; 404 becomes `NotFound(what)`
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

/// Parse the free-form publish dates catalogues return
///
/// Accepts `2006`, `2006-01`, `2006-01-02`, `Jan 2006` and `Jan 2, 2006`.
/// Missing month or day default to the first.
pub fn parse_publish_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().ok().and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%b %d, %Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {}", raw), "%d %b %Y"))
        .ok()
}

/// One provider's answer to an autofill lookup
#[derive(Debug, Clone, Serialize)]
pub struct AutofillMatch {
    pub provider: &'static str,
    pub book: NewBook,
}

/// Runs an ISBN lookup against every provider at once
pub struct Autofill {
    providers: Vec<Arc<dyn BookProvider>>,
}

impl Autofill {
    pub fn new(providers: Vec<Arc<dyn BookProvider>>) -> Self {
        Self { providers }
    }

    /// OpenLibrary and Google Books, as configured in `xiazki.toml`
    pub fn from_config(config: &ServerConfig) -> Result<Self, ProviderError> {
        let openlibrary =
            OpenLibraryClient::new(&config.openlibrary_base_url, config.http_timeout())?;
        let googlebooks = GoogleBooksClient::new(
            &config.googlebooks_base_url,
            config.googlebooks_api_key.clone(),
            config.http_timeout(),
        )?;

        let providers: Vec<Arc<dyn BookProvider>> = vec![Arc::new(openlibrary), Arc::new(googlebooks)];
        Ok(Self::new(providers))
    }

    /// Query all providers concurrently
    ///
    /// Matches come back in provider order. Provider failures are logged and
    /// dropped, so an ISBN nobody knows yields an empty list. Only an invalid
    /// ISBN is an error.
    pub async fn lookup(&self, isbn: &str) -> Result<Vec<AutofillMatch>, ProviderError> {
        let isbn = checked_isbn(isbn)?;

        let lookups = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let isbn = isbn.as_str();
            async move {
                let name = provider.name();
                match provider.fetch_by_isbn(isbn).await {
                    Ok(book) => {
                        debug!(provider = name, isbn = %isbn, "Autofill match");
                        Some(AutofillMatch { provider: name, book })
                    }
                    Err(e) => {
                        warn!(
                            provider = name,
                            isbn = %isbn,
                            error = %e,
                            "Autofill provider failed"
                        );
                        None
                    }
                }
            }
        });

        Ok(join_all(lookups).await.into_iter().flatten().collect())
    }

    pub fn count(&self) -> usize {
        self.providers.len()
    }
}
