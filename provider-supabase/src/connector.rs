//! Supabase page lookup connector
//!
//! Implements the `PageSource` trait over PostgREST.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::source::{order_pages, PageRecord, PageSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::SupabaseError;
use crate::types::{PageRow, PostgrestError};

/// Table holding one row per page image
const PAGES_TABLE: &str = "manga_pages";

/// Columns requested for each page row
const PAGE_COLUMNS: &str = "image_url,page_number";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supabase page source
///
/// Issues
/// `GET {base}/rest/v1/manga_pages?select=image_url,page_number&manga_id=eq.{c}&chapter_id=eq.{ch}&order=page_number.asc`
/// with the anon key in both the `apikey` and `Authorization` headers.
///
/// # Example
///
/// ```ignore
/// use provider_supabase::SupabasePageSource;
/// use bridge_traits::source::PageSource;
///
/// let source = SupabasePageSource::new(http_client, "https://project.supabase.co", anon_key)?;
/// let pages = source.list_pages(42, 118).await?;
/// ```
pub struct SupabasePageSource {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    anon_key: String,
}

impl SupabasePageSource {
    /// Create a new connector.
    ///
    /// Fails when the URL is not http(s) or the key is blank.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let anon_key = anon_key.into();

        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(SupabaseError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                base_url
            )));
        }
        if anon_key.trim().is_empty() {
            return Err(SupabaseError::InvalidConfig(
                "anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            http_client,
            base_url,
            anon_key,
        })
    }

    fn pages_url(&self, collection_id: i64, chapter_id: i64) -> String {
        format!(
            "{}/rest/v1/{}?select={}&manga_id=eq.{}&chapter_id=eq.{}&order=page_number.asc",
            self.base_url, PAGES_TABLE, PAGE_COLUMNS, collection_id, chapter_id
        )
    }

    fn request(&self, url: &str) -> HttpRequest {
        HttpRequest::get(url)
            .header("apikey", self.anon_key.clone())
            .bearer_token(self.anon_key.clone())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    async fn fetch_rows(&self, collection_id: i64, chapter_id: i64) -> crate::error::Result<Vec<PageRow>> {
        let url = self.pages_url(collection_id, chapter_id);
        let response = self.http_client.execute(self.request(&url)).await?;

        if !response.is_success() {
            let message = PostgrestError::describe(&response.body);
            warn!(status = response.status, %message, "Page lookup rejected");
            return Err(SupabaseError::ApiError {
                status_code: response.status,
                message,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            SupabaseError::ParseError(format!("Failed to parse {} rows: {}", PAGES_TABLE, e))
        })
    }
}

#[async_trait]
impl PageSource for SupabasePageSource {
    #[instrument(skip(self))]
    async fn list_pages(&self, collection_id: i64, chapter_id: i64) -> Result<Vec<PageRecord>> {
        debug!("Querying chapter pages");

        let rows = self.fetch_rows(collection_id, chapter_id).await?;
        let total = rows.len();

        let records: Vec<PageRecord> = rows
            .into_iter()
            .filter(|row| !row.image_url.trim().is_empty())
            .map(PageRecord::from)
            .collect();

        if records.len() < total {
            warn!(
                skipped = total - records.len(),
                "Ignoring page rows without an image URL"
            );
        }

        info!(pages = records.len(), "Listed chapter pages");

        // PostgREST already orders; rows sharing a null page_number keep their order
        Ok(order_pages(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn source(mock: MockHttpClient) -> SupabasePageSource {
        SupabasePageSource::new(Arc::new(mock), "https://project.supabase.co/", "anon-key")
            .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let result = SupabasePageSource::new(Arc::new(MockHttpClient::new()), "project", "k");
        assert!(matches!(result, Err(SupabaseError::InvalidConfig(_))));

        let result =
            SupabasePageSource::new(Arc::new(MockHttpClient::new()), "https://p.co", "  ");
        assert!(matches!(result, Err(SupabaseError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_list_pages_builds_query_and_headers() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(
                req.url,
                "https://project.supabase.co/rest/v1/manga_pages?select=image_url,page_number\
                 &manga_id=eq.42&chapter_id=eq.118&order=page_number.asc"
            );
            assert_eq!(req.headers.get("apikey"), Some(&"anon-key".to_string()));
            assert_eq!(
                req.headers.get("Authorization"),
                Some(&"Bearer anon-key".to_string())
            );

            let body = r#"[
                {"image_url": "https://cdn/p1.webp", "page_number": 1},
                {"image_url": "https://cdn/p2.webp", "page_number": 2}
            ]"#;
            Ok(HttpResponse::new(200, body))
        });

        let pages = source(mock_http).list_pages(42, 118).await.unwrap();
        assert_eq!(
            pages,
            vec![
                PageRecord::new("https://cdn/p1.webp", 1),
                PageRecord::new("https://cdn/p2.webp", 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_pages_orders_by_page_number() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| {
            let body = r#"[
                {"image_url": "https://cdn/p3.webp", "page_number": 3},
                {"image_url": "https://cdn/p1.webp", "page_number": 1},
                {"image_url": "", "page_number": 2}
            ]"#;
            Ok(HttpResponse::new(200, body))
        });

        let urls: Vec<_> = source(mock_http)
            .list_pages(1, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.image_url)
            .collect();
        assert_eq!(urls, vec!["https://cdn/p1.webp", "https://cdn/p3.webp"]);
    }

    #[tokio::test]
    async fn test_empty_chapter_is_not_an_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "[]")));

        let pages = source(mock_http).list_pages(1, 9).await.unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"message":"Invalid API key","hint":"Double check your key"}"#,
            ))
        });

        let err = source(mock_http).list_pages(1, 1).await.unwrap_err();
        match err {
            BridgeError::OperationFailed(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, "<html>")));

        let err = source(mock_http).list_pages(1, 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(msg) if msg.contains("Parse error")));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("Connection failed".to_string())));

        let err = source(mock_http).list_pages(1, 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(msg) if msg.contains("Connection")));
    }
}
