use serde::{Deserialize, Serialize};

/// Supported browser engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Chromium,
    Firefox,
    Webkit,
}

/// Status codes for fetch operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Failed,
    Timeout,
    Invalid,
    Retry,
}

/// Authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Credential,
    Cookie,
    Token,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Cookie => "cookie",
            Self::Token => "token",
        }
    }
}

// Timeouts and retry defaults (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_SCROLL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SCROLL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_SCROLL_ATTEMPTS: u32 = 10;

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MIN_SESSION_AGE_DAYS: i64 = 1;
pub const MAX_SESSION_AGE_DAYS: i64 = 30;

// Browser defaults
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// File names
pub const COOKIES_FILENAME: &str = "cookies.json";
pub const STORAGE_STATE_FILENAME: &str = "storage.json";

// Canonical storage subdirectories under the data root
pub const SESSIONS_DIR: &str = "sessions";
pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const CACHE_DIR: &str = "caches";
pub const RAW_DATA_DIR: &str = "raw";
pub const PROCESSED_DATA_DIR: &str = "processed";
pub const PROXIES_DIR: &str = "proxies";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_forms() {
        assert_eq!(serde_json::to_string(&BrowserType::Chromium).unwrap(), "\"chromium\"");
        assert_eq!(serde_json::to_string(&FetchStatus::Timeout).unwrap(), "\"timeout\"");
        assert_eq!(serde_json::to_string(&AuthMethod::Credential).unwrap(), "\"credential\"");
        assert_eq!(AuthMethod::Cookie.as_str(), "cookie");
    }

    #[test]
    fn test_limits_are_sane() {
        assert!(DEFAULT_TIMEOUT_MS >= MIN_TIMEOUT_MS);
        assert!(MIN_SESSION_AGE_DAYS < MAX_SESSION_AGE_DAYS);
    }
}
