use async_trait::async_trait;
use bridge_desktop::{MemoryContentCache, MemorySettingsStore};
use bridge_traits::{
    error::Result as BridgeResult, HttpClient, HttpRequest, HttpResponse, PageRecord, PageSource,
    SettingsStore,
};
use core_offline::{DownloadFailure, DownloadState, OfflineConfig};
use core_runtime::config::CoreConfig;
use core_service::{bootstrap, CoreError};
use mockall::mock;
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const BACKEND: &str = "https://project.supabase.co";

fn is_pages_query(request: &HttpRequest) -> bool {
    request.url.starts_with(BACKEND) && request.url.contains("/rest/v1/manga_pages")
}

/// Backend answers with two pages; the CDN serves page bytes.
fn backend_and_cdn() -> MockHttpClient {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            is_pages_query(request)
                && request.url.contains("manga_id=eq.42")
                && request.url.contains("chapter_id=eq.901")
                && request.headers.get("apikey") == Some(&"anon-key".to_string())
        })
        .times(1)
        .returning(|_| {
            let rows = serde_json::json!([
                {"image_url": "https://cdn.example.com/p2.webp", "page_number": 2},
                {"image_url": "https://cdn.example.com/p1.webp", "page_number": 1}
            ]);
            Ok(HttpResponse::new(200, rows.to_string()))
        });
    http.expect_execute()
        .withf(|request| request.url.starts_with("https://cdn.example.com/"))
        .times(2)
        .returning(|request| Ok(HttpResponse::new(200, request.url.into_bytes())));
    http
}

fn config(http: MockHttpClient, settings: Arc<MemorySettingsStore>) -> CoreConfig {
    CoreConfig::builder()
        .supabase_url(format!("{}/", BACKEND))
        .supabase_anon_key("anon-key")
        .data_dir("/tmp/rift-test/data")
        .cache_dir("/tmp/rift-test/cache")
        .http_client(Arc::new(http))
        .settings_store(settings)
        .content_cache(Arc::new(MemoryContentCache::new()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_bootstrap_downloads_through_supabase() {
    let settings = Arc::new(MemorySettingsStore::new());
    let core = bootstrap(config(backend_and_cdn(), settings), OfflineConfig::default())
        .await
        .unwrap();

    let state = core.start_download(42, 901, "7", Some("Chapter Seven")).await;

    assert_eq!(state, DownloadState::saved());
    let library = core.offline_library().await.unwrap();
    assert_eq!(
        library[0].pages,
        vec![
            "https://cdn.example.com/p1.webp".to_string(),
            "https://cdn.example.com/p2.webp".to_string()
        ]
    );
    assert_eq!(
        core.read_page(42, "7", "https://cdn.example.com/p1.webp")
            .await
            .unwrap()
            .as_deref(),
        Some("https://cdn.example.com/p1.webp".as_bytes())
    );
}

#[tokio::test]
async fn test_bootstrap_restores_manifest() {
    let settings = Arc::new(MemorySettingsStore::new());
    settings
        .set_string(
            "offline_library",
            r#"[{"manga_id":1,"id":10,"chapter_number":"3","title":"Chapter 3","offline":true,"pages":["u"]},
                {"manga_id":2,"id":20,"chapter_number":"1","title":"Chapter 1","offline":true,"pages":["v"]}]"#,
        )
        .await
        .unwrap();

    let core = bootstrap(config(MockHttpClient::new(), settings), OfflineConfig::default())
        .await
        .unwrap();

    assert!(core.check_status(1, "3").is_saved());
    assert!(core.check_status(2, "1").is_saved());
    assert_eq!(core.snapshot().len(), 2);
}

#[tokio::test]
async fn test_backend_error_is_lookup_failure() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(is_pages_query)
        .returning(|_| Ok(HttpResponse::new(503, "unavailable")));

    let core = bootstrap(
        config(http, Arc::new(MemorySettingsStore::new())),
        OfflineConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(
        core.start_download(42, 901, "7", None).await,
        DownloadState::failed(DownloadFailure::LookupFailed)
    );
    assert!(core.check_status(42, "7").failure().is_some());
}

struct StaticSource;

#[async_trait]
impl PageSource for StaticSource {
    async fn list_pages(&self, _collection_id: i64, _chapter_id: i64) -> BridgeResult<Vec<PageRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_injected_page_source_wins() {
    let config = CoreConfig::builder()
        .data_dir("/tmp/rift-test/data")
        .cache_dir("/tmp/rift-test/cache")
        .http_client(Arc::new(MockHttpClient::new()))
        .settings_store(Arc::new(MemorySettingsStore::new()))
        .content_cache(Arc::new(MemoryContentCache::new()))
        .page_source(Arc::new(StaticSource))
        .build()
        .unwrap();

    let core = bootstrap(config, OfflineConfig::default()).await.unwrap();

    assert_eq!(
        core.start_download(1, 1, "1", None).await,
        DownloadState::failed(DownloadFailure::NoPages)
    );
}

#[tokio::test]
async fn test_missing_page_source_is_capability_error() {
    let mut config = config(MockHttpClient::new(), Arc::new(MemorySettingsStore::new()));
    config.supabase_anon_key = None;

    let result = bootstrap(config, OfflineConfig::default()).await;
    assert!(matches!(result, Err(CoreError::CapabilityMissing { .. })));
}

#[tokio::test]
async fn test_invalid_offline_config_is_rejected() {
    let config = config(MockHttpClient::new(), Arc::new(MemorySettingsStore::new()));
    let offline = OfflineConfig::default().with_manifest_key("");

    let result = bootstrap(config, offline).await;
    assert!(matches!(result, Err(CoreError::Offline(_))));
}
