use serde_json::{json, Map, Value};

use crate::config::platform::determine_platform;
use crate::config::ConfigStore;
use crate::error::{FetchError, Result};
use crate::fetcher::Fetcher;

pub mod facebook;
pub mod twitter;

pub use facebook::FacebookFetcher;
pub use twitter::TwitterFetcher;

/// Creates platform fetchers by name.
pub struct FetcherFactory;

impl FetcherFactory {
    /// Build a fetcher for the given platform, or for the resolved default
    /// when none is named. Unknown platforms are a configuration error.
    pub fn create(
        config: &ConfigStore,
        platform: Option<&str>,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Box<dyn Fetcher>> {
        let name = match platform {
            Some(name) => name.to_string(),
            None => determine_platform(config, overrides.as_ref()),
        };

        let mut overrides = overrides.unwrap_or_default();
        overrides.insert("platform".to_string(), json!(name));

        match name.as_str() {
            "facebook" => Ok(Box::new(FacebookFetcher::new(config, Some(overrides))?)),
            "twitter" => Ok(Box::new(TwitterFetcher::new(config, Some(overrides))?)),
            other => Err(FetchError::config(format!("unsupported platform: {other}"))),
        }
    }

    /// Platforms this build knows how to drive.
    pub fn supported_platforms() -> &'static [&'static str] {
        &["facebook", "twitter"]
    }
}

/// Items selector for a session, from effective settings with a fallback.
pub(crate) fn items_selector(settings: &Map<String, Value>, fallback: &str) -> String {
    settings
        .get("selectors")
        .and_then(Value::as_object)
        .and_then(|s| s.get("items"))
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// In-page extraction script: text and first link of every matched item.
pub(crate) fn build_extraction_script(item_selector: &str) -> String {
    let mut script = String::new();
    script.push_str("(() => {\n");
    script.push_str("  const results = [];\n");
    script.push_str(&format!(
        "  for (const item of document.querySelectorAll('{item_selector}')) {{\n"
    ));
    script.push_str("    const link = item.querySelector('a');\n");
    script.push_str("    results.push({\n");
    script.push_str("      text: item.textContent || '',\n");
    script.push_str("      link: link ? (link.href || '') : '',\n");
    script.push_str("    });\n");
    script.push_str("  }\n");
    script.push_str("  return results;\n");
    script.push_str("})()");
    script
}

/// Search URL for a platform: parse the configured base, set the search
/// path, and append the query pairs. A malformed base URL is a
/// configuration error.
pub(crate) fn search_url(
    base: &str,
    path: &str,
    pairs: &[(&str, &str)],
) -> Result<String> {
    let mut url = url::Url::parse(base)
        .map_err(|e| FetchError::config(format!("invalid base_url '{base}': {e}")))?;
    url.set_path(path);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}
