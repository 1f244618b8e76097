//! Domain models for offline chapters

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity of a downloadable chapter: collection id plus chapter number.
///
/// Chapter numbers are compared as strings, so `"1"` and `"1.0"` are
/// different chapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterKey {
    pub collection_id: i64,
    pub chapter_number: String,
}

impl ChapterKey {
    pub fn new(collection_id: i64, chapter_number: impl Into<String>) -> Self {
        Self {
            collection_id,
            chapter_number: chapter_number.into(),
        }
    }

    /// Content bucket name, e.g. `manga-42-chapter-7`.
    pub fn bucket_name(&self, prefix: &str) -> String {
        format!(
            "{}-{}-chapter-{}",
            prefix, self.collection_id, self.chapter_number
        )
    }

    /// Bucket that receives pages until the download completes, e.g.
    /// `manga-staging-42-chapter-7`.
    ///
    /// The marker sits before the numeric collection id, so no chapter number
    /// can produce a staging name.
    pub fn staging_bucket_name(&self, prefix: &str) -> String {
        self.bucket_name(&format!("{}-staging", prefix))
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manga {} chapter {}", self.collection_id, self.chapter_number)
    }
}

/// One saved chapter in the offline library manifest.
///
/// Serialized field names are shared with the web reader's `offline_library`
/// slot, so both can read the same manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterManifestEntry {
    pub manga_id: i64,

    /// Backend chapter id
    pub id: i64,

    #[serde(deserialize_with = "string_or_number")]
    pub chapter_number: String,

    pub title: String,

    pub offline: bool,

    /// Page image URLs in reading order
    pub pages: Vec<String>,

    /// Unix seconds of the successful download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
}

impl ChapterManifestEntry {
    pub fn new(
        key: &ChapterKey,
        chapter_id: i64,
        title: Option<&str>,
        pages: Vec<String>,
        saved_at: i64,
    ) -> Self {
        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => default_title(&key.chapter_number),
        };

        Self {
            manga_id: key.collection_id,
            id: chapter_id,
            chapter_number: key.chapter_number.clone(),
            title,
            offline: true,
            pages,
            saved_at: Some(saved_at),
        }
    }

    pub fn key(&self) -> ChapterKey {
        ChapterKey::new(self.manga_id, self.chapter_number.clone())
    }
}

/// Title used when the caller has none: `Chapter {number}`.
pub fn default_title(chapter_number: &str) -> String {
    format!("Chapter {}", chapter_number)
}

// Older manifests store chapter numbers as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "chapter_number must be a string or number, got {}",
            other
        ))),
    }
}

/// Why a download ended in the error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailure {
    /// The backend page lookup failed
    LookupFailed,
    /// The backend listed zero pages
    NoPages,
    /// A page fetch returned non-2xx or failed in transport
    TransferFailed,
    /// Local storage rejected a read or write
    StorageFailed,
    /// The page timeout or the download deadline elapsed
    TimedOut,
}

impl DownloadFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookupFailed => "lookup_failed",
            Self::NoPages => "no_pages",
            Self::TransferFailed => "transfer_failed",
            Self::StorageFailed => "storage_failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum DownloadStatus {
    Idle,
    Fetching,
    Downloading,
    Saved,
    Error(DownloadFailure),
}

/// Transient per-chapter download state shown by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    #[serde(flatten)]
    pub status: DownloadStatus,
    /// 0..=100
    pub progress: u8,
}

/// What the download button does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadAction {
    /// Begin (or retry) the download
    Start,
    /// Delete the saved copy
    Remove { requires_confirmation: bool },
    /// Busy; the control is disabled
    None,
}

impl DownloadState {
    pub const fn idle() -> Self {
        Self {
            status: DownloadStatus::Idle,
            progress: 0,
        }
    }

    pub const fn fetching() -> Self {
        Self {
            status: DownloadStatus::Fetching,
            progress: 0,
        }
    }

    pub fn downloading(progress: u8) -> Self {
        Self {
            status: DownloadStatus::Downloading,
            progress: progress.min(100),
        }
    }

    pub const fn saved() -> Self {
        Self {
            status: DownloadStatus::Saved,
            progress: 100,
        }
    }

    pub const fn failed(failure: DownloadFailure) -> Self {
        Self {
            status: DownloadStatus::Error(failure),
            progress: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == DownloadStatus::Idle
    }

    pub fn is_saved(&self) -> bool {
        self.status == DownloadStatus::Saved
    }

    /// Fetching or downloading.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Fetching | DownloadStatus::Downloading
        )
    }

    pub fn failure(&self) -> Option<DownloadFailure> {
        match self.status {
            DownloadStatus::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// Download button label.
    pub fn label(&self) -> String {
        match self.status {
            DownloadStatus::Idle => "⬇ Offline".to_string(),
            DownloadStatus::Fetching => "🔍 Finding...".to_string(),
            DownloadStatus::Downloading => format!("{}%", self.progress),
            DownloadStatus::Saved => "🗑️ Remove".to_string(),
            DownloadStatus::Error(_) => "❌ Retry".to_string(),
        }
    }

    pub fn action(&self) -> DownloadAction {
        match self.status {
            DownloadStatus::Idle | DownloadStatus::Error(_) => DownloadAction::Start,
            DownloadStatus::Saved => DownloadAction::Remove {
                requires_confirmation: true,
            },
            DownloadStatus::Fetching | DownloadStatus::Downloading => DownloadAction::None,
        }
    }
}

impl Default for DownloadState {
    fn default() -> Self {
        Self::idle()
    }
}

/// `round(completed * 100 / total)`, halves rounding up.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((completed * 200 + total) / (total * 2)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        let key = ChapterKey::new(42, "7.5");
        assert_eq!(key.bucket_name("manga"), "manga-42-chapter-7.5");
        assert_eq!(key.staging_bucket_name("manga"), "manga-staging-42-chapter-7.5");
    }

    #[test]
    fn test_staging_name_never_matches_a_chapter_bucket() {
        let staging = ChapterKey::new(1, "1").staging_bucket_name("manga");
        let tricky = ChapterKey::new(1, "1.staging").bucket_name("manga");
        assert_ne!(staging, tricky);
        assert_ne!(
            ChapterKey::new(1, "1").bucket_name("manga"),
            ChapterKey::new(1, "1").staging_bucket_name("manga")
        );
    }

    #[test]
    fn test_chapter_numbers_compare_as_strings() {
        assert_ne!(ChapterKey::new(1, "1"), ChapterKey::new(1, "1.0"));
    }

    #[test]
    fn test_manifest_entry_default_title_and_wire_format() {
        let key = ChapterKey::new(3, "12");
        let entry = ChapterManifestEntry::new(&key, 901, None, vec!["u1".into()], 1_700_000_000);
        assert_eq!(entry.title, "Chapter 12");
        assert!(entry.offline);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "manga_id": 3,
                "id": 901,
                "chapter_number": "12",
                "title": "Chapter 12",
                "offline": true,
                "pages": ["u1"],
                "saved_at": 1_700_000_000
            })
        );

        let blank = ChapterManifestEntry::new(&key, 901, Some("  "), vec![], 0);
        assert_eq!(blank.title, "Chapter 12");
    }

    #[test]
    fn test_manifest_entry_reads_legacy_shape() {
        let legacy = r#"{"manga_id":2,"id":5,"chapter_number":1,"title":"Chapter 1","offline":true,"pages":[]}"#;
        let entry: ChapterManifestEntry = serde_json::from_str(legacy).unwrap();
        assert_eq!(entry.chapter_number, "1");
        assert_eq!(entry.saved_at, None);
        assert_eq!(entry.key(), ChapterKey::new(2, "1"));
    }

    #[test]
    fn test_progress_percent() {
        let steps: Vec<u8> = (1..=10).map(|i| progress_percent(i, 10)).collect();
        assert_eq!(steps, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);

        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13);
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn test_labels_and_actions() {
        assert_eq!(DownloadState::idle().label(), "⬇ Offline");
        assert_eq!(DownloadState::fetching().label(), "🔍 Finding...");
        assert_eq!(DownloadState::downloading(40).label(), "40%");
        assert_eq!(DownloadState::saved().label(), "🗑️ Remove");
        assert_eq!(
            DownloadState::failed(DownloadFailure::NoPages).label(),
            "❌ Retry"
        );

        assert_eq!(DownloadState::idle().action(), DownloadAction::Start);
        assert_eq!(
            DownloadState::failed(DownloadFailure::TimedOut).action(),
            DownloadAction::Start
        );
        assert_eq!(
            DownloadState::saved().action(),
            DownloadAction::Remove {
                requires_confirmation: true
            }
        );
        assert_eq!(DownloadState::downloading(5).action(), DownloadAction::None);
        assert_eq!(DownloadState::fetching().action(), DownloadAction::None);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(DownloadState::failed(DownloadFailure::NoPages)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "error", "failure": "no_pages", "progress": 0})
        );

        let json = serde_json::to_value(DownloadState::downloading(30)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "downloading", "progress": 30}));
    }
}
