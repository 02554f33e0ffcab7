use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod retry;
pub mod session;

use crate::config::platform::{determine_platform, platform_config};
use crate::config::ConfigStore;
use crate::constants::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_MS, FetchStatus,
};
use crate::error::{FetchError, Result};
use crate::page::Page;

/// Fetcher lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    Uninitialized,
    Initialized,
    Closed,
}

/// Result of one fetch operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub platform: String,
    pub query: String,
    pub items: Vec<Map<String, Value>>,
    pub status: FetchStatus,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

/// Per-platform scraping session.
///
/// Owns the page handle for its Initialized lifetime and carries the
/// effective settings merged once at construction: platform sub-tree, then
/// the general `fetcher` tree, then caller overrides, later sources winning
/// key-by-key. Settings are not recomputed if the configuration changes
/// afterward.
pub struct FetcherSession {
    platform: String,
    settings: Map<String, Value>,
    page: Option<Arc<dyn Page>>,
    state: FetcherState,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl FetcherSession {
    pub fn new(config: &ConfigStore, overrides: Option<Map<String, Value>>) -> Result<Self> {
        let platform = determine_platform(config, overrides.as_ref());
        info!("Creating fetcher session for platform: {}", platform);

        let mut settings = platform_config(config, &platform);
        if let Some(fetcher_tree) = config.subtree("fetcher") {
            for (key, value) in fetcher_tree {
                settings.insert(key.clone(), value.clone());
            }
        }
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                settings.insert(key, value);
            }
        }

        let timeout_ms = settings
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| config.get_u64("fetcher.timeout_ms", DEFAULT_TIMEOUT_MS));
        let retry_attempts = nested_u64(&settings, "retry", "attempts")
            .unwrap_or_else(|| config.get_u64("fetcher.retry.attempts", DEFAULT_RETRY_ATTEMPTS as u64))
            as u32;
        let retry_delay_ms = nested_u64(&settings, "retry", "delay_ms")
            .unwrap_or_else(|| config.get_u64("fetcher.retry.delay_ms", DEFAULT_RETRY_DELAY_MS));

        debug!("Effective settings computed for {}", platform);

        Ok(Self {
            platform,
            settings,
            page: None,
            state: FetcherState::Uninitialized,
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
            retry_delay: Duration::from_millis(retry_delay_ms),
        })
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn state(&self) -> FetcherState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == FetcherState::Initialized
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Attach the page handle and mark the session ready.
    ///
    /// The page cannot be absent by construction; the handle is owned
    /// exclusively by this session until `close`.
    pub fn initialize(&mut self, page: Arc<dyn Page>) -> Result<()> {
        self.page = Some(page);
        self.state = FetcherState::Initialized;
        info!("Fetcher initialized for platform: {}", self.platform);
        Ok(())
    }

    /// Precondition shared by all data operations.
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(FetchError::fetching(
                "fetcher must be initialized before fetching data",
            ));
        }
        Ok(())
    }

    fn page(&self) -> Result<&Arc<dyn Page>> {
        self.page
            .as_ref()
            .ok_or_else(|| FetchError::initialization("no page handle attached"))
    }

    /// Shared handle to the attached page, for platform fetch logic.
    pub fn page_handle(&self) -> Result<Arc<dyn Page>> {
        self.page
            .clone()
            .ok_or_else(|| FetchError::initialization("no page handle attached"))
    }

    /// Release the page handle. Idempotent; release failures are logged and
    /// swallowed.
    pub async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            debug!("Closing page for platform: {}", self.platform);
            if let Err(e) = page.close().await {
                warn!("Error while closing page: {}", e);
            }
        }
        self.state = FetcherState::Closed;
        info!("Closed fetcher resources for platform: {}", self.platform);
    }

    /// Run an operation with guaranteed cleanup.
    ///
    /// The session closes exactly once on every exit path; an operation
    /// error is logged and then returned unchanged.
    pub async fn run_scoped<T>(
        &mut self,
        op: impl for<'a> FnOnce(
            &'a mut FetcherSession,
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    ) -> Result<T> {
        let result = op(self).await;
        if let Err(e) = &result {
            error!("Error during scoped use of {} fetcher: {}", self.platform, e);
        }
        self.close().await;
        result
    }

    /// Liveness probe: fails if the session is not ready or the page title
    /// cannot be read.
    pub async fn health_check(&self) -> Result<()> {
        if !self.is_initialized() || self.page.is_none() {
            return Err(FetchError::initialization(format!(
                "{} fetcher not properly initialized",
                self.platform
            )));
        }

        match self.page()?.title().await {
            Ok(_) => {
                debug!("{} fetcher health check passed", self.platform);
                Ok(())
            }
            Err(e) => Err(FetchError::fetching_caused_by(
                format!("{} fetcher health check failed", self.platform),
                e,
            )),
        }
    }

    /// Capture a screenshot, creating parent directories as needed.
    pub async fn capture_screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FetchError::fetching_caused_by("screenshot capturing failed", e)
            })?;
        }

        let page = self.page()?;
        page.screenshot(path)
            .await
            .map_err(|e| FetchError::fetching_caused_by("screenshot capturing failed", e))?;
        info!("Captured screenshot: {}", path.display());
        Ok(())
    }

    /// Wait for a selector to become visible, retrying transient transport
    /// failures up to the configured attempt count.
    pub async fn wait_for_selector(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.timeout);
        let page = self.page()?;

        retry::retry(
            &format!("wait for selector '{selector}'"),
            self.retry_attempts,
            self.retry_delay,
            || page.wait_for_selector(selector, timeout),
        )
        .await?;

        debug!("{}: selector '{}' is visible", self.platform, selector);
        Ok(())
    }

    /// Persist this session's cookies/tokens.
    pub async fn save_session(&self, data: &Map<String, Value>, path: &Path) -> Result<()> {
        session::save_session(data, path).await
    }

    /// Restore previously persisted cookies/tokens; empty when none exist.
    pub async fn load_session(&self, path: &Path) -> Result<Map<String, Value>> {
        session::load_session(path).await
    }
}

/// Contract implemented by every platform fetcher.
#[async_trait]
pub trait Fetcher: Send {
    fn session(&self) -> &FetcherSession;

    fn session_mut(&mut self) -> &mut FetcherSession;

    /// Fetch data for a query. Implementations must call
    /// `session().ensure_ready()` before touching the page.
    async fn fetch(&mut self, query: &str, options: &Map<String, Value>) -> Result<FetchResult>;

    /// Extract structured fields from one raw element.
    async fn extract(&self, element: &Value) -> Result<Map<String, Value>>;
}

/// Trim leading/trailing whitespace from every string field; everything else
/// passes through unchanged.
pub fn sanitize_data(raw: Map<String, Value>) -> Map<String, Value> {
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, Value::String(s.trim().to_string())),
            other => (key, other),
        })
        .collect()
}

fn nested_u64(settings: &Map<String, Value>, outer: &str, inner: &str) -> Option<u64> {
    settings
        .get(outer)
        .and_then(Value::as_object)
        .and_then(|m| m.get(inner))
        .and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::mock::MockPage;
    use serde_json::json;

    fn test_config() -> ConfigStore {
        ConfigStore::with_defaults()
    }

    fn overrides(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_explicit_platform_override() {
        let config = test_config();
        let session = FetcherSession::new(
            &config,
            Some(overrides(&[("platform", json!("instagram"))])),
        )
        .unwrap();
        assert_eq!(session.platform(), "instagram");
    }

    #[test]
    fn test_settings_merge_precedence() {
        let config = test_config();
        // The facebook platform tree and the fetcher tree both exist; a
        // caller override must win over both.
        let session = FetcherSession::new(
            &config,
            Some(overrides(&[
                ("platform", json!("facebook")),
                ("base_url", json!("https://staging.example.com")),
                ("timeout_ms", json!(5000)),
            ])),
        )
        .unwrap();

        assert_eq!(
            session.settings()["base_url"],
            json!("https://staging.example.com")
        );
        assert_eq!(session.timeout(), Duration::from_millis(5000));
        // keys from the fetcher tree survive where not overridden
        assert_eq!(session.settings()["stealth_mode"], json!(true));
    }

    #[test]
    fn test_retry_settings_from_config() {
        let config = test_config();
        let session = FetcherSession::new(&config, None).unwrap();
        assert_eq!(session.retry_attempts(), 3);
        assert_eq!(session.retry_delay, Duration::from_millis(5000));
    }

    #[test]
    fn test_fetch_precondition() {
        let config = test_config();
        let session = FetcherSession::new(&config, None).unwrap();
        let err = session.ensure_ready().unwrap_err();
        assert!(matches!(err, FetchError::Fetching { .. }));
    }

    #[tokio::test]
    async fn test_close_on_never_initialized_session() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();
        session.close().await;
        assert_eq!(session.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_swallows_release_failure() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();

        let page = Arc::new(MockPage::new());
        *page.fail_close.lock().unwrap() = true;
        session.initialize(page.clone()).unwrap();

        session.close().await;
        session.close().await;

        // second close is a no-op: the handle was already released
        assert_eq!(page.times_closed(), 1);
        assert_eq!(session.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_scoped_use_closes_once_and_reraises() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();
        let page = Arc::new(MockPage::new());
        session.initialize(page.clone()).unwrap();

        let result: Result<()> = session
            .run_scoped(|_s| {
                Box::pin(async { Err(FetchError::extraction("no items on page")) })
            })
            .await;

        match result.unwrap_err() {
            FetchError::Extraction { message } => assert_eq!(message, "no items on page"),
            other => panic!("original error must pass through, got {other:?}"),
        }
        assert_eq!(page.times_closed(), 1);
        assert_eq!(session.state(), FetcherState::Closed);
    }

    #[tokio::test]
    async fn test_scoped_use_success_still_closes() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();
        let page = Arc::new(MockPage::new());
        session.initialize(page.clone()).unwrap();

        let out = session
            .run_scoped(|s| {
                Box::pin(async move {
                    s.ensure_ready()?;
                    Ok("fetched")
                })
            })
            .await
            .unwrap();

        assert_eq!(out, "fetched");
        assert_eq!(page.times_closed(), 1);
    }

    #[tokio::test]
    async fn test_health_check_states() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();

        let err = session.health_check().await.unwrap_err();
        assert!(matches!(err, FetchError::Initialization { .. }));

        let page = Arc::new(MockPage::new());
        session.initialize(page.clone()).unwrap();
        session.health_check().await.unwrap();

        // a failing title probe is a fetching failure, not initialization
        *page.title.lock().unwrap() = None;
        let err = session.health_check().await.unwrap_err();
        assert!(matches!(err, FetchError::Fetching { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_selector_retries_transient_failures() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();

        let page = Arc::new(MockPage::new().with_selector("#feed"));
        page.wait_failures_remaining
            .store(2, std::sync::atomic::Ordering::SeqCst);
        session.initialize(page).unwrap();

        session.wait_for_selector("#feed", None).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_selector_exhaustion() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();
        session.initialize(Arc::new(MockPage::new())).unwrap();

        let err = session.wait_for_selector("#missing", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Fetching { .. }));
    }

    #[tokio::test]
    async fn test_capture_screenshot_creates_parent_dirs() {
        let config = test_config();
        let mut session = FetcherSession::new(&config, None).unwrap();
        let page = Arc::new(MockPage::new());
        session.initialize(page.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screens").join("error.png");
        session.capture_screenshot(&path).await.unwrap();

        assert!(path.parent().unwrap().exists());
        assert_eq!(page.screenshots.lock().unwrap()[0], path);
    }

    #[test]
    fn test_sanitize_strips_string_fields() {
        let mut raw = Map::new();
        raw.insert("key".to_string(), json!("  value  "));
        raw.insert("count".to_string(), json!(5));
        raw.insert("missing".to_string(), Value::Null);

        let clean = sanitize_data(raw);
        assert_eq!(clean["key"], json!("value"));
        assert_eq!(clean["count"], json!(5));
        // non-strings pass through unchanged, nulls included
        assert_eq!(clean["missing"], Value::Null);
    }
}
