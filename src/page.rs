use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Browser page handle.
///
/// The framework never talks to a browser library directly; fetchers and
/// strategies drive whatever automation backend the caller supplies through
/// this seam. Implementations map their transport failures to the retryable
/// page error kind.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to the given URL.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Current page title, used as the liveness probe.
    async fn title(&self) -> Result<String>;

    /// Block until the selector is visible or the timeout elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Whether the selector currently matches an element.
    async fn selector_exists(&self, selector: &str) -> Result<bool>;

    /// Evaluate a JavaScript expression and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Capture a screenshot to the given path.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Release the underlying page.
    async fn close(&self) -> Result<()>;
}
