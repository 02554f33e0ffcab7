use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::constants::DEFAULT_USER_AGENT;
use crate::error::{FetchError, Result};
use crate::page::Page;

const DEFAULT_USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) \
     Gecko/20100101 Firefox/121.0",
];

const DETECTION_PROBES: &[&str] = &[
    "iframe[src*='captcha']",
    "[id*='captcha']",
    "[class*='blocked']",
];

/// Shared state for stealth strategies.
pub struct StealthState {
    config: Map<String, Value>,
    page: Option<Arc<dyn Page>>,
    user_agents: Vec<String>,
}

impl StealthState {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        let config = config.unwrap_or_default();
        let user_agents = config
            .get("user_agents")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
            });

        Self {
            config,
            page: None,
            user_agents,
        }
    }

    pub fn initialize(&mut self, page: Arc<dyn Page>) {
        self.page = Some(page);
        debug!("Stealth strategy initialized with page");
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn page(&self) -> Option<&Arc<dyn Page>> {
        self.page.as_ref()
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }
}

/// Anti-detection strategy contract.
#[async_trait]
pub trait StealthStrategy: Send {
    fn state(&self) -> &StealthState;

    fn state_mut(&mut self) -> &mut StealthState;

    fn initialize(&mut self, page: Arc<dyn Page>) {
        self.state_mut().initialize(page);
    }

    /// Apply the strategy's evasion measures to the current page.
    /// Returns whether anything was actually applied.
    async fn apply(&mut self) -> Result<bool>;

    /// Override the reported user agent with a random pick from the pool.
    ///
    /// Returns false instead of erroring when the page is missing or the
    /// override script fails; stealth is best effort.
    async fn set_random_user_agent(&self) -> bool {
        let page = match self.state().page() {
            Some(page) => page,
            None => {
                error!("Page not initialized, cannot set user agent");
                return false;
            }
        };

        let agent = {
            let mut rng = rand::thread_rng();
            match self.state().user_agents().choose(&mut rng) {
                Some(agent) => agent.clone(),
                None => return false,
            }
        };

        let script = format!(
            "Object.defineProperty(navigator, 'userAgent', \
             {{get: () => '{agent}'}})"
        );
        match page.evaluate(&script).await {
            Ok(_) => {
                debug!("User agent overridden");
                true
            }
            Err(e) => {
                warn!("Failed to set user agent: {}", e);
                false
            }
        }
    }

    /// Probe the page for bot-detection markers.
    ///
    /// Conservative: answers true when the page is missing or any probe
    /// fails, so callers back off rather than push through a challenge.
    async fn is_detected(&self) -> bool {
        let page = match self.state().page() {
            Some(page) => page,
            None => {
                warn!("Page not initialized, assuming detection");
                return true;
            }
        };

        for probe in DETECTION_PROBES {
            match page.selector_exists(probe).await {
                Ok(true) => {
                    warn!("Detection marker present: {}", probe);
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Detection probe failed: {}", e);
                    return true;
                }
            }
        }
        false
    }
}

/// Stealth via user agent rotation only.
pub struct UserAgentStealth {
    state: StealthState,
}

impl UserAgentStealth {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        Self {
            state: StealthState::new(config),
        }
    }
}

#[async_trait]
impl StealthStrategy for UserAgentStealth {
    fn state(&self) -> &StealthState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StealthState {
        &mut self.state
    }

    async fn apply(&mut self) -> Result<bool> {
        if self.state.page().is_none() {
            return Err(FetchError::stealth("page not initialized"));
        }
        Ok(self.set_random_user_agent().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::mock::MockPage;
    use serde_json::json;

    #[test]
    fn test_default_user_agent_pool() {
        let state = StealthState::new(None);
        assert!(!state.user_agents().is_empty());
        assert_eq!(state.user_agents()[0], DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_configured_user_agent_pool() {
        let mut config = Map::new();
        config.insert("user_agents".into(), json!(["agent-a", "agent-b"]));
        let state = StealthState::new(Some(config));
        assert_eq!(state.user_agents(), ["agent-a", "agent-b"]);
    }

    #[tokio::test]
    async fn test_set_user_agent_without_page() {
        let stealth = UserAgentStealth::new(None);
        assert!(!stealth.set_random_user_agent().await);
    }

    #[tokio::test]
    async fn test_apply_without_page_is_a_stealth_error() {
        let mut stealth = UserAgentStealth::new(None);
        let err = stealth.apply().await.unwrap_err();
        assert!(matches!(err, FetchError::Stealth { .. }));
    }

    #[tokio::test]
    async fn test_apply_overrides_user_agent() {
        let mut config = Map::new();
        config.insert("user_agents".into(), json!(["only-agent"]));
        let mut stealth = UserAgentStealth::new(Some(config));
        let page = Arc::new(MockPage::new());
        stealth.initialize(page.clone());

        assert!(stealth.apply().await.unwrap());
        let scripts = page.eval_scripts.lock().unwrap();
        assert!(scripts[0].contains("'userAgent'"));
        assert!(scripts[0].contains("only-agent"));
    }

    #[tokio::test]
    async fn test_is_detected_without_page() {
        let stealth = UserAgentStealth::new(None);
        assert!(stealth.is_detected().await);
    }

    #[tokio::test]
    async fn test_is_detected_clean_page() {
        let mut stealth = UserAgentStealth::new(None);
        stealth.initialize(Arc::new(MockPage::new()));
        assert!(!stealth.is_detected().await);
    }

    #[tokio::test]
    async fn test_is_detected_captcha_marker() {
        let mut stealth = UserAgentStealth::new(None);
        let page = MockPage::new().with_selector("iframe[src*='captcha']");
        stealth.initialize(Arc::new(page));
        assert!(stealth.is_detected().await);
    }

    #[tokio::test]
    async fn test_is_detected_probe_failure() {
        let mut stealth = UserAgentStealth::new(None);
        let page = Arc::new(MockPage::new());
        *page.fail_evaluate.lock().unwrap() = true;
        stealth.initialize(page);
        assert!(stealth.is_detected().await);
    }
}
