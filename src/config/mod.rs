use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{
    AuthMethod, CACHE_DIR, COOKIES_FILENAME, MAX_SESSION_AGE_DAYS, MIN_SESSION_AGE_DAYS,
    PROCESSED_DATA_DIR, PROXIES_DIR, RAW_DATA_DIR, SCREENSHOTS_DIR, SESSIONS_DIR,
    STORAGE_STATE_FILENAME,
};
use crate::error::{FetchError, Result};

pub mod platform;

/// Layered configuration store.
///
/// Holds two JSON documents: the main document (logging, storage paths, app
/// metadata, platform definitions, optional `meta` schema block) and a
/// fetcher document (fetcher-specific overrides). Constructed explicitly and
/// passed by reference to every consumer; load once, read many.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    main: Map<String, Value>,
    fetcher: Map<String, Value>,
}

impl ConfigStore {
    /// Load configuration from the given file paths.
    ///
    /// A missing file is not an error: the main document falls back to a
    /// minimal built-in default and the fetcher document to an empty
    /// `fetcher` section. A file that exists but is not valid JSON fails
    /// with a configuration error, and `meta` schema violations fail with a
    /// validation error naming the offending dot-path.
    pub fn load(main_path: Option<&Path>, fetcher_path: Option<&Path>) -> Result<Self> {
        let mut main = match main_path {
            Some(path) if path.exists() => read_document(path)?,
            Some(path) => {
                warn!("Configuration file not found: {}, using defaults", path.display());
                minimal_document()
            }
            None => minimal_document(),
        };

        let fetcher = match fetcher_path {
            Some(path) if path.exists() => read_document(path)?,
            _ => {
                let mut doc = Map::new();
                doc.insert("fetcher".to_string(), json!({}));
                doc
            }
        };

        validate_meta(&mut main)?;

        info!("Configuration loaded");
        Ok(Self { main, fetcher })
    }

    /// Construct a store from the full built-in default document.
    pub fn with_defaults() -> Self {
        let mut main = builtin_document();
        // The built-in document always satisfies its own meta block.
        validate_meta(&mut main).expect("built-in configuration must validate");
        let mut fetcher = Map::new();
        fetcher.insert("fetcher".to_string(), json!({}));
        Self { main, fetcher }
    }

    /// Construct a store from in-memory documents, validating `meta`.
    pub fn from_documents(mut main: Map<String, Value>, fetcher: Map<String, Value>) -> Result<Self> {
        validate_meta(&mut main)?;
        Ok(Self { main, fetcher })
    }

    /// Resolve a dot-separated path against the main document.
    ///
    /// Precedence, highest first: environment variable (`a.b.c` -> `A_B_C`),
    /// the document value, then the `meta` schema default for that path.
    /// Absent keys yield `None`, never an error.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Ok(env_value) = std::env::var(env_var_name(path)) {
            return Some(Value::String(env_value));
        }

        if let Some(value) = get_nested(&self.main, path) {
            return Some(value.clone());
        }

        self.meta_default(path)
    }

    /// Resolve a dot path against the fetcher document only.
    ///
    /// Does not consult environment variables or the main document's meta.
    pub fn get_fetcher(&self, path: &str) -> Option<Value> {
        get_nested(&self.fetcher, path).cloned()
    }

    pub fn get_str(&self, path: &str, default: &str) -> String {
        match self.get(path) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    pub fn get_u64(&self, path: &str, default: u64) -> u64 {
        self.get(path).and_then(|v| coerce_u64(&v)).unwrap_or(default)
    }

    pub fn get_i64(&self, path: &str, default: i64) -> i64 {
        self.get(path).and_then(|v| coerce_i64(&v)).unwrap_or(default)
    }

    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        self.get(path).and_then(|v| coerce_f64(&v)).unwrap_or(default)
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path).and_then(|v| coerce_bool(&v)).unwrap_or(default)
    }

    /// Get an object sub-tree of the main document.
    pub fn subtree(&self, path: &str) -> Option<&Map<String, Value>> {
        get_nested(&self.main, path).and_then(Value::as_object)
    }

    /// Set a value at a dot path in the main document, then revalidate.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        set_nested(&mut self.main, path, value);
        validate_meta(&mut self.main)?;
        debug!("Configuration value set: {}", path);
        Ok(())
    }

    /// Save the main document to a file as 2-space-indented JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FetchError::config(format!("cannot create {}: {e}", parent.display())))?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(self.main.clone()))
            .map_err(|e| FetchError::config(format!("cannot serialize configuration: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| FetchError::config(format!("cannot write {}: {e}", path.display())))?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Export the main document with sensitive values masked.
    pub fn export_safe(&self) -> Value {
        mask_sensitive(&Value::Object(self.main.clone()))
    }

    /// Flat iteration over all leaf (path, value) pairs of the main document.
    pub fn iter_paths(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        collect_paths(&self.main, String::new(), &mut out);
        out
    }

    fn meta_default(&self, path: &str) -> Option<Value> {
        self.main
            .get("meta")
            .and_then(Value::as_object)
            .and_then(|meta| meta.get(path))
            .and_then(Value::as_object)
            .and_then(|entry| entry.get("default"))
            .cloned()
    }

    // Canonical storage path accessors.

    pub fn sessions_path(&self) -> String {
        self.get_str("storage_paths.sessions_path", &format!("data/{SESSIONS_DIR}"))
    }

    pub fn screenshots_path(&self) -> String {
        self.get_str(
            "storage_paths.screenshots_path",
            &format!("data/{SCREENSHOTS_DIR}"),
        )
    }

    pub fn cache_path(&self) -> String {
        self.get_str("storage_paths.cache_path", &format!("data/{CACHE_DIR}"))
    }

    pub fn proxies_path(&self) -> String {
        self.get_str("storage_paths.proxies_path", &format!("data/{PROXIES_DIR}"))
    }

    pub fn raw_data_path(&self) -> String {
        self.get_str("storage_paths.raw_data_path", &format!("data/{RAW_DATA_DIR}"))
    }

    pub fn processed_data_path(&self) -> String {
        self.get_str(
            "storage_paths.processed_data_path",
            &format!("data/{PROCESSED_DATA_DIR}"),
        )
    }

    /// Canonical cookies artifact for a platform's saved session.
    pub fn cookies_file(&self, platform: &str) -> PathBuf {
        Path::new(&self.sessions_path())
            .join(platform)
            .join(COOKIES_FILENAME)
    }

    /// Canonical browser storage-state artifact for a platform.
    pub fn storage_state_file(&self, platform: &str) -> PathBuf {
        Path::new(&self.sessions_path())
            .join(platform)
            .join(STORAGE_STATE_FILENAME)
    }
}

/// Environment variable name for a dot path: `a.b.c` -> `A_B_C`.
fn env_var_name(path: &str) -> String {
    path.to_uppercase().replace('.', "_")
}

fn read_document(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FetchError::config(format!("cannot read {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| FetchError::config(format!("invalid JSON in {}: {e}", path.display())))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(FetchError::config(format!(
            "configuration root must be an object: {}",
            path.display()
        ))),
    }
}

fn storage_paths_tree() -> Value {
    json!({
        "sessions_path": format!("data/{SESSIONS_DIR}"),
        "screenshots_path": format!("data/{SCREENSHOTS_DIR}"),
        "cache_path": format!("data/{CACHE_DIR}"),
        "proxies_path": format!("data/{PROXIES_DIR}"),
        "raw_data_path": format!("data/{RAW_DATA_DIR}"),
        "processed_data_path": format!("data/{PROCESSED_DATA_DIR}")
    })
}

/// Minimal fallback document used when the main configuration file is absent.
fn minimal_document() -> Map<String, Value> {
    let doc = json!({
        "logging": { "log_dir": "logs" },
        "storage_paths": storage_paths_tree()
    });
    match doc {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Full built-in default document: platform definitions plus the
/// self-describing `meta` schema block.
fn builtin_document() -> Map<String, Value> {
    let doc = json!({
        "app": {
            "name": "socialfetch",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": "development"
        },
        "logging": {
            "log_dir": "logs",
            "console_level": "debug",
            "file_level": "info",
            "max_files": 3
        },
        "storage_paths": storage_paths_tree(),
        "fetcher": {
            "default_platform": "facebook",
            "timeout_ms": 60000,
            "stealth_mode": true,
            "screenshot_on_error": true,
            "retry": {
                "attempts": 3,
                "delay_ms": 5000
            }
        },
        "authentication": {
            "method": AuthMethod::Credential.as_str(),
            "session_validity_days": 7,
            "auto_renew_session": true
        },
        "stealth": {
            "user_agent_rotation": true,
            "fingerprint_spoofing": true,
            "proxy": {
                "enabled": false,
                "rotation_interval_seconds": 600
            },
            "human_behavior": {
                "enabled": true,
                "delay_ms": { "min": 500, "max": 3000 }
            }
        },
        "platforms": {
            "facebook": {
                "base_url": "https://facebook.com",
                "login_url": "https://facebook.com/login",
                "selectors": {
                    "login": {
                        "email_field": "#email",
                        "password_field": "#pass",
                        "login_button": "[data-testid='royal_login_button']",
                        "logged_in_indicator": "[data-testid='bookmark_nav']"
                    },
                    "items": "[role='article']"
                },
                "timeouts": {
                    "login_ms": 30000,
                    "action_ms": 10000
                }
            },
            "twitter": {
                "base_url": "https://twitter.com",
                "login_url": "https://twitter.com/i/flow/login",
                "selectors": {
                    "login": {
                        "username_field": "input[name='text']",
                        "password_field": "input[name='password']",
                        "login_button": "div[data-testid='LoginForm_Login_Button']"
                    },
                    "items": "article[data-testid='tweet']"
                },
                "timeouts": {
                    "login_ms": 30000,
                    "action_ms": 10000
                }
            }
        },
        "meta": {
            "fetcher.default_platform": {
                "type": "str",
                "default": "facebook",
                "choices": ["facebook", "twitter", "instagram", "linkedin"]
            },
            "fetcher.timeout_ms": {
                "type": "int",
                "default": 60000,
                "min": 1000
            },
            "fetcher.stealth_mode": {
                "type": "bool",
                "default": true
            },
            "authentication.session_validity_days": {
                "type": "int",
                "default": 7,
                "min": MIN_SESSION_AGE_DAYS,
                "max": MAX_SESSION_AGE_DAYS
            }
        }
    });
    match doc {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Validate the document against its own `meta` schema block.
///
/// For every meta entry: inject the default when the target path is missing
/// (missing with no default is an error), then check the resolved value
/// against the declared type and any min/max/choices constraints.
fn validate_meta(doc: &mut Map<String, Value>) -> Result<()> {
    let meta = match doc.get("meta").and_then(Value::as_object) {
        Some(meta) => meta.clone(),
        None => return Ok(()),
    };

    for (path, entry) in &meta {
        let entry = match entry.as_object() {
            Some(entry) => entry,
            None => continue,
        };

        if get_nested(doc, path).is_none() {
            match entry.get("default") {
                Some(default) => set_nested(doc, path, default.clone()),
                None => {
                    return Err(FetchError::config_validation(
                        path,
                        "required key missing and no default declared",
                    ))
                }
            }
        }

        let value = get_nested(doc, path).cloned().unwrap_or(Value::Null);

        if let Some(ty) = entry.get("type").and_then(Value::as_str) {
            let ok = match ty {
                "str" => value.is_string(),
                "int" => value.is_i64() || value.is_u64(),
                "bool" => value.is_boolean(),
                "float" => value.is_number(),
                _ => true,
            };
            if !ok {
                return Err(FetchError::config_validation(
                    path,
                    format!("expected type '{ty}', got {value}"),
                ));
            }
        }

        if let Some(min) = entry.get("min").and_then(Value::as_f64) {
            if let Some(n) = value.as_f64() {
                if n < min {
                    return Err(FetchError::config_validation(
                        path,
                        format!("value {n} below minimum {min}"),
                    ));
                }
            }
        }

        if let Some(max) = entry.get("max").and_then(Value::as_f64) {
            if let Some(n) = value.as_f64() {
                if n > max {
                    return Err(FetchError::config_validation(
                        path,
                        format!("value {n} above maximum {max}"),
                    ));
                }
            }
        }

        if let Some(choices) = entry.get("choices").and_then(Value::as_array) {
            if !choices.contains(&value) {
                return Err(FetchError::config_validation(
                    path,
                    format!("value {value} not in allowed choices"),
                ));
            }
        }
    }

    Ok(())
}

fn get_nested<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn set_nested(doc: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let last = match parts.pop() {
        Some(last) => last,
        None => return,
    };

    let mut current = doc;
    for part in parts {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot.as_object_mut().expect("slot was just made an object");
    }
    current.insert(last.to_string(), value);
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

const SENSITIVE_TERMS: &[&str] = &["password", "token", "secret", "key", "credential"];

fn mask_sensitive(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let lowered = k.to_lowercase();
                if v.is_object() {
                    out.insert(k.clone(), mask_sensitive(v));
                } else if SENSITIVE_TERMS.iter().any(|term| lowered.contains(term)) {
                    out.insert(k.clone(), Value::String("********".to_string()));
                } else {
                    out.insert(k.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn collect_paths(map: &Map<String, Value>, prefix: String, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => collect_paths(inner, path, out),
            other => out.push((path, other.clone())),
        }
    }
}
