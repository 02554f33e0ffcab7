use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::constants::{
    DEFAULT_MAX_SCROLL_ATTEMPTS, DEFAULT_SCROLL_DELAY_MS, DEFAULT_SCROLL_TIMEOUT_MS,
};
use crate::error::{FetchError, Result};
use crate::page::Page;

/// Shared state for scrolling strategies.
pub struct ScrollState {
    config: Map<String, Value>,
    page: Option<Arc<dyn Page>>,
    scroll_timeout: Duration,
    scroll_delay: Duration,
    max_scroll_attempts: u32,
}

impl ScrollState {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        let config = config.unwrap_or_default();
        let scroll_timeout = config
            .get("scroll_timeout")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_SCROLL_TIMEOUT_MS);
        let scroll_delay = config
            .get("scroll_delay")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_SCROLL_DELAY_MS);
        let max_scroll_attempts = config
            .get("max_scroll_attempts")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_SCROLL_ATTEMPTS as u64) as u32;

        Self {
            config,
            page: None,
            scroll_timeout: Duration::from_millis(scroll_timeout),
            scroll_delay: Duration::from_millis(scroll_delay),
            max_scroll_attempts,
        }
    }

    pub fn initialize(&mut self, page: Arc<dyn Page>) {
        self.page = Some(page);
        debug!("Scrolling strategy initialized with page");
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn page(&self) -> Option<&Arc<dyn Page>> {
        self.page.as_ref()
    }

    pub fn scroll_timeout(&self) -> Duration {
        self.scroll_timeout
    }

    pub fn scroll_delay(&self) -> Duration {
        self.scroll_delay
    }

    pub fn max_scroll_attempts(&self) -> u32 {
        self.max_scroll_attempts
    }
}

/// Scrolling strategy contract.
#[async_trait]
pub trait ScrollStrategy: Send {
    fn state(&self) -> &ScrollState;

    fn state_mut(&mut self) -> &mut ScrollState;

    fn initialize(&mut self, page: Arc<dyn Page>) {
        self.state_mut().initialize(page);
    }

    /// Scroll the page to load more content. Zero for either bound means
    /// unlimited; the strategy's own attempt cap still applies.
    async fn scroll(&mut self, target_items: u32, max_time_ms: u64) -> Result<bool>;

    /// Scroll a specific element into view.
    ///
    /// Degrades gracefully: returns false without a page, and transport
    /// errors are logged and suppressed rather than propagated.
    async fn scroll_to_element(&self, selector: &str) -> bool {
        let page = match self.state().page() {
            Some(page) => page,
            None => {
                error!("Page not initialized, cannot scroll to element");
                return false;
            }
        };

        if let Err(e) = page
            .wait_for_selector(selector, self.state().scroll_timeout())
            .await
        {
            warn!("Error scrolling to element '{}': {}", selector, e);
            return false;
        }

        let script = format!(
            "document.querySelector('{selector}').scrollIntoView({{block: 'center'}})"
        );
        match page.evaluate(&script).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Error scrolling to element '{}': {}", selector, e);
                false
            }
        }
    }

    /// Current scroll position, (0, 0) when it cannot be determined.
    async fn scroll_position(&self) -> (i64, i64) {
        let page = match self.state().page() {
            Some(page) => page,
            None => {
                error!("Page not initialized, cannot get scroll position");
                return (0, 0);
            }
        };

        let script = "({x: window.scrollX || window.pageXOffset, \
                       y: window.scrollY || window.pageYOffset})";
        match page.evaluate(script).await {
            Ok(value) => {
                let x = value.get("x").and_then(Value::as_i64).unwrap_or(0);
                let y = value.get("y").and_then(Value::as_i64).unwrap_or(0);
                (x, y)
            }
            Err(e) => {
                warn!("Error getting scroll position: {}", e);
                (0, 0)
            }
        }
    }
}

/// Scrolls to the bottom repeatedly until content stops growing.
pub struct TimedScroller {
    state: ScrollState,
}

impl TimedScroller {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        Self {
            state: ScrollState::new(config),
        }
    }

    fn items_selector(&self) -> Option<String> {
        self.state
            .config()
            .get("items_selector")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl ScrollStrategy for TimedScroller {
    fn state(&self) -> &ScrollState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ScrollState {
        &mut self.state
    }

    async fn scroll(&mut self, target_items: u32, max_time_ms: u64) -> Result<bool> {
        let page = match self.state.page() {
            Some(page) => page.clone(),
            None => {
                error!("Page not initialized, cannot scroll");
                return Ok(false);
            }
        };

        let deadline = if max_time_ms > 0 {
            Some(tokio::time::Instant::now() + Duration::from_millis(max_time_ms))
        } else {
            None
        };

        let mut last_height: i64 = -1;
        for attempt in 0..self.state.max_scroll_attempts() {
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    debug!("Scroll time budget exhausted after {} attempts", attempt);
                    break;
                }
            }

            if target_items > 0 {
                if let Some(selector) = self.items_selector() {
                    let count_script =
                        format!("document.querySelectorAll('{selector}').length");
                    let count = page
                        .evaluate(&count_script)
                        .await
                        .ok()
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0);
                    if count >= target_items as u64 {
                        debug!("Reached target of {} items", target_items);
                        return Ok(true);
                    }
                }
            }

            let height = page
                .evaluate("document.body.scrollHeight")
                .await
                .map_err(|e| FetchError::scrolling(format!("height probe failed: {e}")))?
                .as_i64()
                .unwrap_or(0);
            if height == last_height {
                debug!("No more content loaded after scrolling");
                break;
            }
            last_height = height;

            page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .map_err(|e| FetchError::scrolling(format!("scroll step failed: {e}")))?;
            tokio::time::sleep(self.state.scroll_delay()).await;
        }

        Ok(true)
    }
}

/// Walks paginated content by clicking a "next" link.
pub struct PaginationScroller {
    state: ScrollState,
}

impl PaginationScroller {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        Self {
            state: ScrollState::new(config),
        }
    }

    fn next_selector(&self) -> String {
        self.state
            .config()
            .get("next_selector")
            .and_then(Value::as_str)
            .unwrap_or("a[rel='next']")
            .to_string()
    }
}

#[async_trait]
impl ScrollStrategy for PaginationScroller {
    fn state(&self) -> &ScrollState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ScrollState {
        &mut self.state
    }

    async fn scroll(&mut self, target_items: u32, max_time_ms: u64) -> Result<bool> {
        let page = match self.state.page() {
            Some(page) => page.clone(),
            None => {
                error!("Page not initialized, cannot paginate");
                return Ok(false);
            }
        };

        let next_selector = self.next_selector();
        let max_pages = if target_items > 0 {
            target_items
        } else {
            self.state.max_scroll_attempts()
        };
        let deadline = if max_time_ms > 0 {
            Some(tokio::time::Instant::now() + Duration::from_millis(max_time_ms))
        } else {
            None
        };

        for page_num in 1..=max_pages {
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    break;
                }
            }

            match page.selector_exists(&next_selector).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("No more pages after page {}", page_num);
                    break;
                }
                Err(e) => {
                    return Err(FetchError::scrolling(format!(
                        "pagination probe failed: {e}"
                    )));
                }
            }

            page.evaluate(&format!(
                "document.querySelector('{next_selector}').click()"
            ))
            .await
            .map_err(|e| FetchError::scrolling(format!("next page click failed: {e}")))?;
            tokio::time::sleep(self.state.scroll_delay()).await;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::mock::MockPage;
    use serde_json::json;

    fn config(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_scroll_to_element_without_page() {
        let scroller = TimedScroller::new(None);
        assert!(!scroller.scroll_to_element("#feed").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_to_element_with_page() {
        let mut scroller = TimedScroller::new(None);
        let page = Arc::new(MockPage::new().with_selector("#feed"));
        scroller.initialize(page.clone());

        assert!(scroller.scroll_to_element("#feed").await);
        let scripts = page.eval_scripts.lock().unwrap();
        assert!(scripts[0].contains("scrollIntoView"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_to_missing_element_suppresses_error() {
        let mut scroller = TimedScroller::new(None);
        scroller.initialize(Arc::new(MockPage::new()));
        assert!(!scroller.scroll_to_element("#missing").await);
    }

    #[tokio::test]
    async fn test_scroll_position_fallback() {
        let scroller = TimedScroller::new(None);
        assert_eq!(scroller.scroll_position().await, (0, 0));

        let mut scroller = TimedScroller::new(None);
        let page = Arc::new(MockPage::new());
        *page.fail_evaluate.lock().unwrap() = true;
        scroller.initialize(page);
        assert_eq!(scroller.scroll_position().await, (0, 0));
    }

    #[tokio::test]
    async fn test_scroll_position_from_page() {
        let mut scroller = TimedScroller::new(None);
        let page = Arc::new(MockPage::new());
        page.push_eval_result(json!({ "x": 10, "y": 250 }));
        scroller.initialize(page);
        assert_eq!(scroller.scroll_position().await, (10, 250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_scroller_stops_when_height_settles() {
        let mut scroller =
            TimedScroller::new(Some(config(&[("scroll_delay", json!(10))])));
        let page = Arc::new(MockPage::new());
        // heights: grows once, then settles
        page.push_eval_result(json!(1000));
        page.push_eval_result(Value::Null); // scrollTo
        page.push_eval_result(json!(2000));
        page.push_eval_result(Value::Null); // scrollTo
        page.push_eval_result(json!(2000));
        scroller.initialize(page.clone());

        assert!(scroller.scroll(0, 0).await.unwrap());
        let scripts = page.eval_scripts.lock().unwrap();
        assert_eq!(
            scripts.iter().filter(|s| s.contains("scrollTo")).count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_scroller_honors_target_items() {
        let mut scroller = TimedScroller::new(Some(config(&[
            ("items_selector", json!(".post")),
            ("scroll_delay", json!(10)),
        ])));
        let page = Arc::new(MockPage::new());
        page.push_eval_result(json!(25)); // enough items on first check
        scroller.initialize(page.clone());

        assert!(scroller.scroll(20, 0).await.unwrap());
        assert_eq!(page.eval_scripts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_scroller_clicks_until_link_gone() {
        let mut scroller =
            PaginationScroller::new(Some(config(&[("scroll_delay", json!(10))])));
        let page = Arc::new(MockPage::new().with_selector("a[rel='next']"));
        scroller.initialize(page.clone());

        // only two pages requested
        assert!(scroller.scroll(2, 0).await.unwrap());
        let scripts = page.eval_scripts.lock().unwrap();
        assert_eq!(scripts.iter().filter(|s| s.contains(".click()")).count(), 2);
    }

    #[tokio::test]
    async fn test_scroll_without_page_returns_false() {
        let mut scroller = PaginationScroller::new(None);
        assert!(!scroller.scroll(0, 0).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_surfaces_as_scrolling_error() {
        let mut scroller = TimedScroller::new(None);
        let page = Arc::new(MockPage::new());
        *page.fail_evaluate.lock().unwrap() = true;
        scroller.initialize(page);

        let err = scroller.scroll(0, 0).await.unwrap_err();
        assert!(matches!(err, FetchError::Scrolling { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_probe_failure_surfaces_as_scrolling_error() {
        let mut scroller = PaginationScroller::new(None);
        let page = Arc::new(MockPage::new().with_selector("a[rel='next']"));
        scroller.initialize(page.clone());
        *page.fail_evaluate.lock().unwrap() = true;

        let err = scroller.scroll(0, 0).await.unwrap_err();
        assert!(matches!(err, FetchError::Scrolling { .. }));
    }
}
