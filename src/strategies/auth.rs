use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::page::Page;

/// Shared state for authentication strategies.
pub struct AuthState {
    config: Map<String, Value>,
    page: Option<Arc<dyn Page>>,
    authenticated: bool,
}

impl AuthState {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        Self {
            config: config.unwrap_or_default(),
            page: None,
            authenticated: false,
        }
    }

    pub fn initialize(&mut self, page: Arc<dyn Page>) {
        self.page = Some(page);
        debug!("Authentication strategy initialized with page");
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn page(&self) -> Option<&Arc<dyn Page>> {
        self.page.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, value: bool) {
        self.authenticated = value;
    }
}

/// Authentication strategy contract.
#[async_trait]
pub trait AuthStrategy: Send {
    fn state(&self) -> &AuthState;

    fn state_mut(&mut self) -> &mut AuthState;

    fn initialize(&mut self, page: Arc<dyn Page>) {
        self.state_mut().initialize(page);
    }

    /// Authenticate against the platform. Returns whether a session is now
    /// established.
    async fn authenticate(&mut self) -> Result<bool>;

    /// Whether login is still needed.
    fn is_login_required(&self) -> bool {
        if self.state().page().is_none() {
            warn!("Page not initialized, cannot check login status");
            return true;
        }
        !self.state().is_authenticated()
    }

    /// Whether the last login attempt succeeded.
    fn verify_login(&self) -> bool {
        self.state().is_authenticated()
    }
}

/// Re-applies a previously saved session artifact (cookies).
pub struct CookieAuth {
    state: AuthState,
    session_path: PathBuf,
}

impl CookieAuth {
    pub fn new(config: Option<Map<String, Value>>, session_path: PathBuf) -> Self {
        Self {
            state: AuthState::new(config),
            session_path,
        }
    }
}

#[async_trait]
impl AuthStrategy for CookieAuth {
    fn state(&self) -> &AuthState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AuthState {
        &mut self.state
    }

    async fn authenticate(&mut self) -> Result<bool> {
        let page = self
            .state
            .page()
            .cloned()
            .ok_or_else(|| FetchError::authentication("page not initialized"))?;

        let artifact = crate::fetcher::session::load_session(&self.session_path).await?;
        if artifact.is_empty() {
            debug!("No saved session at {}", self.session_path.display());
            return Ok(false);
        }

        let cookies = artifact
            .get("cookies")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for cookie in &cookies {
            let (name, value) = match (
                cookie.get("name").and_then(Value::as_str),
                cookie.get("value").and_then(Value::as_str),
            ) {
                (Some(name), Some(value)) => (name, value),
                _ => continue,
            };
            page.evaluate(&format!("document.cookie = '{name}={value}'"))
                .await
                .map_err(|e| {
                    FetchError::authentication(format!("failed applying cookie '{name}': {e}"))
                })?;
        }

        self.state.set_authenticated(!cookies.is_empty());
        info!(
            "Applied {} saved cookies from {}",
            cookies.len(),
            self.session_path.display()
        );
        Ok(self.state.is_authenticated())
    }
}

/// Logs in with username/password pulled from the environment.
///
/// Credentials are looked up as `{PLATFORM}_USERNAME` (or `{PLATFORM}_EMAIL`)
/// and `{PLATFORM}_PASSWORD`; they are never stored in configuration files.
pub struct CredentialAuth {
    state: AuthState,
    platform: String,
}

impl CredentialAuth {
    pub fn new(config: Option<Map<String, Value>>, platform: impl Into<String>) -> Self {
        Self {
            state: AuthState::new(config),
            platform: platform.into(),
        }
    }

    /// Platform credentials from the environment.
    pub fn platform_credentials(platform: &str) -> (Option<String>, Option<String>) {
        let prefix = platform.to_uppercase();
        let username = std::env::var(format!("{prefix}_USERNAME"))
            .or_else(|_| std::env::var(format!("{prefix}_EMAIL")))
            .ok();
        let password = std::env::var(format!("{prefix}_PASSWORD")).ok();
        (username, password)
    }

    fn login_selector(&self, field: &str) -> Option<String> {
        self.state
            .config()
            .get("selectors")
            .and_then(Value::as_object)
            .and_then(|s| s.get("login"))
            .and_then(Value::as_object)
            .and_then(|login| login.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl AuthStrategy for CredentialAuth {
    fn state(&self) -> &AuthState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AuthState {
        &mut self.state
    }

    async fn authenticate(&mut self) -> Result<bool> {
        let page = self
            .state
            .page()
            .cloned()
            .ok_or_else(|| FetchError::authentication("page not initialized"))?;

        let (username, password) = Self::platform_credentials(&self.platform);
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) => (u, p),
            _ => {
                return Err(FetchError::authentication(format!(
                    "no credentials configured for platform '{}'",
                    self.platform
                )))
            }
        };

        if let Some(login_url) = self
            .state
            .config()
            .get("login_url")
            .and_then(Value::as_str)
        {
            page.goto(login_url).await?;
        }

        let user_field = self
            .login_selector("email_field")
            .or_else(|| self.login_selector("username_field"))
            .ok_or_else(|| FetchError::authentication("no login field selector configured"))?;
        let pass_field = self
            .login_selector("password_field")
            .ok_or_else(|| FetchError::authentication("no password field selector configured"))?;
        let button = self
            .login_selector("login_button")
            .ok_or_else(|| FetchError::authentication("no login button selector configured"))?;

        let script = format!(
            "(() => {{\n\
             document.querySelector('{user_field}').value = '{username}';\n\
             document.querySelector('{pass_field}').value = '{password}';\n\
             document.querySelector('{button}').click();\n\
             }})()"
        );
        page.evaluate(&script)
            .await
            .map_err(|e| FetchError::authentication(format!("login form submit failed: {e}")))?;

        let logged_in = match self.login_selector("logged_in_indicator") {
            Some(indicator) => page.selector_exists(&indicator).await.unwrap_or(false),
            None => true,
        };

        self.state.set_authenticated(logged_in);
        info!(
            "Credential login for {}: {}",
            self.platform,
            if logged_in { "succeeded" } else { "not verified" }
        );
        Ok(logged_in)
    }
}

/// Injects a bearer token into browser storage.
pub struct TokenAuth {
    state: AuthState,
}

impl TokenAuth {
    pub fn new(config: Option<Map<String, Value>>) -> Self {
        Self {
            state: AuthState::new(config),
        }
    }
}

#[async_trait]
impl AuthStrategy for TokenAuth {
    fn state(&self) -> &AuthState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AuthState {
        &mut self.state
    }

    async fn authenticate(&mut self) -> Result<bool> {
        let page = self
            .state
            .page()
            .cloned()
            .ok_or_else(|| FetchError::authentication("page not initialized"))?;

        let token = match self.state.config().get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(FetchError::authentication("no token configured")),
        };

        page.evaluate(&format!(
            "window.localStorage.setItem('auth_token', '{token}')"
        ))
        .await
        .map_err(|e| FetchError::authentication(format!("failed storing token: {e}")))?;

        self.state.set_authenticated(true);
        Ok(true)
    }
}
