//! Remote Page Source Abstraction
//!
//! Looks up the page images that make up one chapter on the hosted backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One page row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub image_url: String,
    #[serde(default)]
    pub page_number: Option<i64>,
}

impl PageRecord {
    pub fn new(image_url: impl Into<String>, page_number: i64) -> Self {
        Self {
            image_url: image_url.into(),
            page_number: Some(page_number),
        }
    }
}

/// Remote chapter lookup trait
///
/// Implementations return the pages of `(collection_id, chapter_id)` in
/// reading order. An empty vector means the backend answered but holds no
/// pages; transport or query failures are errors.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn list_pages(&self, collection_id: i64, chapter_id: i64) -> Result<Vec<PageRecord>>;
}

/// Sort records by page number, keeping backend order for rows without one.
pub fn order_pages(mut pages: Vec<PageRecord>) -> Vec<PageRecord> {
    pages.sort_by_key(|p| p.page_number.unwrap_or(i64::MAX));
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_pages_by_number() {
        let pages = vec![
            PageRecord::new("c", 3),
            PageRecord::new("a", 1),
            PageRecord {
                image_url: "z".to_string(),
                page_number: None,
            },
            PageRecord::new("b", 2),
        ];

        let urls: Vec<_> = order_pages(pages)
            .into_iter()
            .map(|p| p.image_url)
            .collect();
        assert_eq!(urls, vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn test_page_record_deserializes_without_number() {
        let record: PageRecord =
            serde_json::from_str(r#"{"image_url":"https://cdn/p1.webp"}"#).unwrap();
        assert_eq!(record.page_number, None);
    }
}
