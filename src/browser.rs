#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use playwright::Playwright;
#[cfg(feature = "browser")]
use serde_json::Value;
#[cfg(feature = "browser")]
use std::path::Path;
#[cfg(feature = "browser")]
use std::time::Duration;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

#[cfg(feature = "browser")]
use crate::constants::{
    DEFAULT_USER_AGENT, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};
use crate::constants::BrowserType;
#[cfg(feature = "browser")]
use crate::error::{FetchError, Result};
#[cfg(feature = "browser")]
use crate::page::Page;

/// Playwright-backed page handle
#[cfg(feature = "browser")]
pub struct BrowserPage {
    playwright: Playwright,
    browser: playwright::api::Browser,
    page: playwright::api::Page,
}

#[cfg(feature = "browser")]
unsafe impl Send for BrowserPage {}
#[cfg(feature = "browser")]
unsafe impl Sync for BrowserPage {}

#[cfg(feature = "browser")]
impl BrowserPage {
    /// Launch a headless browser engine and open a fresh page.
    pub async fn launch(browser_type: BrowserType, user_agent: Option<&str>) -> Result<Self> {
        debug!("Launching browser: {:?}", browser_type);

        let playwright = Playwright::initialize()
            .await
            .map_err(|e| FetchError::page(format!("playwright init failed: {e}")))?;

        let engine = match browser_type {
            BrowserType::Chromium => playwright.chromium(),
            BrowserType::Firefox => playwright.firefox(),
            BrowserType::Webkit => playwright.webkit(),
        };
        let browser = engine
            .launcher()
            .headless(true)
            .launch()
            .await
            .map_err(|e| FetchError::page(format!("browser launch failed: {e}")))?;

        let context = browser
            .context_builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .viewport(Some(playwright::api::Viewport {
                width: DEFAULT_VIEWPORT_WIDTH as i32,
                height: DEFAULT_VIEWPORT_HEIGHT as i32,
            }))
            .build()
            .await
            .map_err(|e| FetchError::page(format!("context creation failed: {e}")))?;

        let page = context
            .new_page()
            .await
            .map_err(|e| FetchError::page(format!("page creation failed: {e}")))?;

        Ok(Self { playwright, browser, page })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl Page for BrowserPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto_builder(url)
            .goto()
            .await
            .map_err(|e| FetchError::page(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        self.page
            .title()
            .await
            .map_err(|e| FetchError::page(format!("title probe failed: {e}")))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.page
            .wait_for_selector_builder(selector)
            .timeout(timeout.as_millis() as f64)
            .wait_for_selector()
            .await
            .map_err(|e| FetchError::page(format!("wait for '{selector}' failed: {e}")))?;
        Ok(())
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let element = self
            .page
            .query_selector(selector)
            .await
            .map_err(|e| FetchError::page(format!("query for '{selector}' failed: {e}")))?;
        Ok(element.is_some())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.page
            .evaluate::<(), Value>(script, ())
            .await
            .map_err(|e| FetchError::page(format!("evaluate failed: {e}")))
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .screenshot_builder()
            .path(path.to_path_buf())
            .screenshot()
            .await
            .map_err(|e| FetchError::page(format!("screenshot failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        let _ = &self.playwright;
        Ok(())
    }
}

// Stub when the browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserPage;

#[cfg(not(feature = "browser"))]
impl BrowserPage {
    pub async fn launch(
        _browser_type: BrowserType,
        _user_agent: Option<&str>,
    ) -> crate::error::Result<Self> {
        Err(crate::error::FetchError::initialization(
            "browser feature not enabled",
        ))
    }
}
