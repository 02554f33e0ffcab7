use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::constants::FetchStatus;
use crate::error::{FetchError, Result};
use crate::fetcher::{sanitize_data, FetchResult, Fetcher, FetcherSession};

use super::{build_extraction_script, items_selector, search_url};

const DEFAULT_BASE_URL: &str = "https://twitter.com";
const DEFAULT_ITEMS_SELECTOR: &str = "article[data-testid='tweet']";

/// Twitter search fetcher
pub struct TwitterFetcher {
    session: FetcherSession,
}

impl TwitterFetcher {
    pub fn new(config: &ConfigStore, overrides: Option<Map<String, Value>>) -> Result<Self> {
        let mut overrides = overrides.unwrap_or_default();
        overrides.insert("platform".to_string(), Value::String("twitter".to_string()));
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
        search_url(base, "/search", &[("q", query), ("src", "typed_query")])
    }
}

#[async_trait]
impl Fetcher for TwitterFetcher {
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
        info!("Fetching tweets: {}", url);
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

        debug!("Fetched {} tweets for '{}'", items.len(), query);
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
            .ok_or_else(|| FetchError::extraction("tweet element is not an object"))?;
        Ok(sanitize_data(raw.clone()))
    }
}
