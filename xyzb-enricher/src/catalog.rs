//! Book catalog API client
//!
//! Two operations against the remote catalog:
//! - `GET {base}/books`: the full record set
//! - `PUT {base}/books/{id}`: replace a single record
//!
//! [`CatalogApi`] is the seam the pipeline depends on; [`HttpCatalogClient`]
//! is the reqwest-backed implementation.

use crate::error::EnrichError;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};
use xyzb_common::{BookRecord, Error, Result};

const USER_AGENT: &str = concat!("xyzb-enricher/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog operations used by the enrichment pipeline
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch every record in the catalog
    ///
    /// Any failure surfaces as [`EnrichError::CatalogUnavailable`].
    async fn fetch_all(&self) -> std::result::Result<Vec<BookRecord>, EnrichError>;

    /// Send the full corrected record back to the catalog
    ///
    /// A non-success response surfaces as [`EnrichError::CatalogRejected`]
    /// carrying the response body. Not retried.
    async fn push_update(&self, book: &BookRecord) -> std::result::Result<(), EnrichError>;
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// API base URL, e.g. `http://localhost:9001/api`
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9001/api".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// reqwest-backed catalog client
pub struct HttpCatalogClient {
    http_client: reqwest::Client,
    books_url: Url,
}

impl HttpCatalogClient {
    pub fn new(config: CatalogClientConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let books_url = Url::parse(&format!("{}/books", base))
            .map_err(|e| Error::Config(format!("Invalid API base URL {:?}: {}", config.base_url, e)))?;

        if books_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base URL {:?} cannot carry a path",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            books_url,
        })
    }

    /// `{base}/books/{id}` with the ID percent-encoded as a path segment
    fn book_url(&self, id: &str) -> Url {
        let mut url = self.books_url.clone();
        // Checked in new(): the URL can be a base
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn fetch_all(&self) -> std::result::Result<Vec<BookRecord>, EnrichError> {
        let url = self.books_url.clone();
        debug!(url = %url, "Fetching catalog");

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| EnrichError::CatalogUnavailable(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            return Err(EnrichError::CatalogUnavailable(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let books: Vec<BookRecord> = response.json().await.map_err(|e| {
            EnrichError::CatalogUnavailable(format!("Malformed catalog payload from {}: {}", url, e))
        })?;

        info!(count = books.len(), "Retrieved books from catalog");
        Ok(books)
    }

    async fn push_update(&self, book: &BookRecord) -> std::result::Result<(), EnrichError> {
        let url = self.book_url(&book.id);
        debug!(book_id = %book.id, url = %url, "Pushing book update");

        let response = self
            .http_client
            .put(url)
            .json(book)
            .send()
            .await
            .map_err(|e| EnrichError::CatalogRejected {
                book_id: book.id.clone(),
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body(response).await;
            warn!(
                book_id = %book.id,
                status = status.as_u16(),
                body = %body,
                "Catalog rejected book update"
            );
            return Err(EnrichError::CatalogRejected {
                book_id: book.id.clone(),
                status: Some(status.as_u16()),
                body,
            });
        }

        info!(
            book_id = %book.id,
            isbn10 = book.isbn10().unwrap_or(""),
            "Successfully updated book"
        );
        Ok(())
    }
}

/// Response body for diagnostics; a body that cannot be read is described instead
async fn read_body(response: reqwest::Response) -> String {
    let url = response.url().clone();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to read response body");
            format!("<unreadable response body: {}>", e)
        }
    }
}
