use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::constants::FetchStatus;
use crate::error::{FetchError, Result};
use crate::fetcher::{sanitize_data, FetchResult, Fetcher, FetcherSession};

use super::{build_extraction_script, items_selector, search_url};

const DEFAULT_BASE_URL: &str = "https://facebook.com";
const DEFAULT_ITEMS_SELECTOR: &str = "[role='article']";

/// Facebook post fetcher
pub struct FacebookFetcher {
    session: FetcherSession,
}

impl FacebookFetcher {
    pub fn new(config: &ConfigStore, overrides: Option<Map<String, Value>>) -> Result<Self> {
        let mut overrides = overrides.unwrap_or_default();
        overrides.insert("platform".to_string(), Value::String("facebook".to_string()));
        Ok(Self {
            session: FetcherSession::new(config, Some(overrides))?,
        })
    }

    fn search_url(&self, query: &str) -> Result<String> {
        let base = self
            .session
            .settings()
            .get("base_url")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_BASE_URL);
        search_url(base, "/search/posts", &[("q", query)])
    }
}

#[async_trait]
impl Fetcher for FacebookFetcher {
    fn session(&self) -> &FetcherSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut FetcherSession {
        &mut self.session
    }

    async fn fetch(&mut self, query: &str, options: &Map<String, Value>) -> Result<FetchResult> {
        self.session.ensure_ready()?;
        let page = self.session.page_handle()?;

        let url = self.search_url(query)?;
        info!("Fetching facebook posts: {}", url);
        page.goto(&url).await?;

        let selector = items_selector(self.session.settings(), DEFAULT_ITEMS_SELECTOR);
        self.session.wait_for_selector(&selector, None).await?;

        let raw = page.evaluate(&build_extraction_script(&selector)).await?;
        let mut items = Vec::new();
        for element in raw.as_array().into_iter().flatten() {
            items.push(self.extract(element).await?);
        }

        if let Some(limit) = options.get("limit").and_then(Value::as_u64) {
            items.truncate(limit as usize);
        }

        debug!("Fetched {} facebook posts for '{}'", items.len(), query);
        Ok(FetchResult {
            platform: self.session.platform().to_string(),
            query: query.to_string(),
            items,
            status: FetchStatus::Success,
            fetched_at: chrono::Utc::now(),
        })
    }

    async fn extract(&self, element: &Value) -> Result<Map<String, Value>> {
        let raw = element
            .as_object()
            .ok_or_else(|| FetchError::extraction("facebook element is not an object"))?;
        Ok(sanitize_data(raw.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::mock::MockPage;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fetch_extracts_and_sanitizes_items() {
        let config = ConfigStore::with_defaults();
        let mut fetcher = FacebookFetcher::new(&config, None).unwrap();

        let page = Arc::new(MockPage::new().with_selector("[role='article']"));
        page.push_eval_result(json!([
            { "text": "  first post  ", "link": "https://facebook.com/p/1" },
            { "text": "second", "link": "" }
        ]));
        fetcher.session_mut().initialize(page.clone()).unwrap();

        let result = fetcher.fetch("rust lang", &Map::new()).await.unwrap();
        assert_eq!(result.status, FetchStatus::Success);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0]["text"], json!("first post"));
        assert!(page.visited.lock().unwrap()[0]
            .starts_with("https://facebook.com/search/posts?q=rust+lang"));
    }

    #[tokio::test]
    async fn test_fetch_respects_limit_option() {
        let config = ConfigStore::with_defaults();
        let mut fetcher = FacebookFetcher::new(&config, None).unwrap();

        let page = Arc::new(MockPage::new().with_selector("[role='article']"));
        page.push_eval_result(json!([
            { "text": "a" }, { "text": "b" }, { "text": "c" }
        ]));
        fetcher.session_mut().initialize(page).unwrap();

        let mut options = Map::new();
        options.insert("limit".to_string(), json!(2));
        let result = fetcher.fetch("anything", &options).await.unwrap();
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_requires_initialization() {
        let config = ConfigStore::with_defaults();
        let mut fetcher = FacebookFetcher::new(&config, None).unwrap();
        let err = fetcher.fetch("query", &Map::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Fetching { .. }));
    }

    #[tokio::test]
    async fn test_extract_rejects_non_objects() {
        let config = ConfigStore::with_defaults();
        let fetcher = FacebookFetcher::new(&config, None).unwrap();
        let err = fetcher.extract(&json!("just a string")).await.unwrap_err();
        assert!(matches!(err, FetchError::Extraction { .. }));
    }
}
