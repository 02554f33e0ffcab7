use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, error, warn};

use crate::error::{FetchError, Result};

/// Persist session data (cookies/tokens) as 2-space-indented JSON.
///
/// Parent directories are created as needed.
pub async fn save_session(data: &Map<String, Value>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            error!("Failed creating session directory {}: {}", parent.display(), e);
            FetchError::fetching_caused_by(
                format!("failed saving session data: {}", path.display()),
                e,
            )
        })?;
    }

    let content = serde_json::to_string_pretty(&Value::Object(data.clone()))
        .map_err(|e| {
            FetchError::fetching_caused_by(
                format!("failed serializing session data: {}", path.display()),
                e,
            )
        })?;

    tokio::fs::write(path, content).await.map_err(|e| {
        error!("Failed saving session data {}: {}", path.display(), e);
        FetchError::fetching_caused_by(
            format!("failed saving session data: {}", path.display()),
            e,
        )
    })?;

    debug!("Session data saved: {}", path.display());
    Ok(())
}

/// Load session data from a file.
///
/// A missing file is not an error and yields an empty mapping; unreadable or
/// malformed content fails as a fetching error.
pub async fn load_session(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        warn!("Session file does not exist: {}", path.display());
        return Ok(Map::new());
    }

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        error!("Failed loading session data {}: {}", path.display(), e);
        FetchError::fetching_caused_by(
            format!("failed loading session data: {}", path.display()),
            e,
        )
    })?;

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        error!("Invalid session data {}: {}", path.display(), e);
        FetchError::fetching_caused_by(
            format!("failed loading session data: {}", path.display()),
            e,
        )
    })?;

    debug!("Session data loaded: {}", path.display());
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(FetchError::fetching(format!(
            "session data is not an object: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facebook").join("cookies.json");

        let mut data = Map::new();
        data.insert("session_token".to_string(), json!("abc123"));
        data.insert("expires".to_string(), json!(1735689600));

        save_session(&data, &path).await.unwrap();
        let loaded = load_session(&path).await.unwrap();
        assert_eq!(loaded, data);

        // 2-space indentation on disk
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"session_token\""));
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_map() {
        let loaded = load_session(Path::new("/nonexistent/cookies.json"))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_fetching_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "{broken").unwrap();

        let err = load_session(&path).await.unwrap_err();
        assert!(matches!(err, FetchError::Fetching { .. }));
    }
}
