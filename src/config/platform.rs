use serde_json::{Map, Value};
use tracing::debug;

use super::ConfigStore;

/// Fallback platform when nothing is configured.
pub const FALLBACK_PLATFORM: &str = "facebook";

/// Determine which platform a fetcher should target.
///
/// Resolution order, first hit wins: an explicit `platform` key in the
/// caller-supplied override map, the `fetcher.default_platform` setting,
/// the first key of the `platforms` sub-tree in document order, then the
/// hard-coded fallback. Always returns a non-empty identifier.
pub fn determine_platform(config: &ConfigStore, overrides: Option<&Map<String, Value>>) -> String {
    let mut platform = overrides
        .and_then(|map| map.get("platform"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if platform.is_none() {
        platform = config
            .get("fetcher.default_platform")
            .and_then(|v| v.as_str().map(str::to_string));
    }

    let resolved = match platform {
        Some(p) if !p.is_empty() && p != "unknown" => p,
        _ => config
            .subtree("platforms")
            .and_then(|platforms| platforms.keys().next().cloned())
            .unwrap_or_else(|| FALLBACK_PLATFORM.to_string()),
    };

    debug!("Resolved platform: {}", resolved);
    resolved
}

/// Platform-scoped configuration sub-tree, empty when unconfigured.
pub fn platform_config(config: &ConfigStore, platform: &str) -> Map<String, Value> {
    config
        .subtree("platforms")
        .and_then(|platforms| platforms.get(platform))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_from(main: Value) -> ConfigStore {
        let main = match main {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        };
        ConfigStore::from_documents(main, Map::new()).unwrap()
    }

    #[test]
    fn test_explicit_override_wins() {
        let store = ConfigStore::with_defaults();
        let mut overrides = Map::new();
        overrides.insert("platform".to_string(), json!("linkedin"));
        assert_eq!(determine_platform(&store, Some(&overrides)), "linkedin");
    }

    #[test]
    fn test_default_platform_from_config() {
        let store = store_from(json!({
            "fetcher": { "default_platform": "twitter" },
            "platforms": { "facebook": {}, "twitter": {} }
        }));
        assert_eq!(determine_platform(&store, None), "twitter");
    }

    #[test]
    fn test_unknown_sentinel_falls_back_to_first_platform() {
        let store = store_from(json!({
            "fetcher": { "default_platform": "unknown" },
            "platforms": { "instagram": {}, "facebook": {} }
        }));
        // preserve_order keeps the document's declared key order
        assert_eq!(determine_platform(&store, None), "instagram");
    }

    #[test]
    fn test_empty_platforms_falls_back_to_hardcoded() {
        let store = store_from(json!({ "platforms": {} }));
        assert_eq!(determine_platform(&store, None), FALLBACK_PLATFORM);
    }

    #[test]
    fn test_never_empty() {
        let store = store_from(json!({}));
        assert!(!determine_platform(&store, None).is_empty());
    }

    #[test]
    fn test_platform_config_subtree() {
        let store = ConfigStore::with_defaults();
        let fb = platform_config(&store, "facebook");
        assert_eq!(fb["base_url"], json!("https://facebook.com"));
        assert!(platform_config(&store, "myspace").is_empty());
    }
}
