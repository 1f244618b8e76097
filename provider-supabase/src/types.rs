//! PostgREST response types

use bridge_traits::source::PageRecord;
use serde::{Deserialize, Serialize};

/// One row of the `manga_pages` table, as selected by the connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRow {
    pub image_url: String,

    #[serde(default)]
    pub page_number: Option<i64>,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        PageRecord {
            image_url: row.image_url,
            page_number: row.page_number,
        }
    }
}

/// Error body returned by PostgREST for failed queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub details: Option<String>,

    #[serde(default)]
    pub hint: Option<String>,
}

impl PostgrestError {
    /// Human-readable summary, falling back to the raw body.
    pub fn describe(body: &[u8]) -> String {
        match serde_json::from_slice::<PostgrestError>(body) {
            Ok(err) => match (err.code, err.message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (None, Some(message)) => message,
                _ => String::from_utf8_lossy(body).into_owned(),
            },
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        }
    }
}
