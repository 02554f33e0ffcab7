//! socialfetch - A pluggable social media scraping framework built in Rust
//!
//! This library provides the skeleton for platform-specific scrapers, including:
//! - Layered JSON configuration with schema validation
//! - A browser page seam with an optional Playwright backend
//! - Fetcher sessions with retry, health checks and session persistence
//! - Composable authentication, scrolling and stealth strategies

pub mod browser;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod page;
pub mod platforms;
pub mod strategies;

// Re-export main types for convenience
pub use crate::config::ConfigStore;
pub use crate::error::{FetchError, Result};
pub use crate::fetcher::{FetchResult, Fetcher, FetcherSession};
pub use crate::page::Page;
pub use crate::platforms::FetcherFactory;
