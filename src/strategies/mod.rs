//! Pluggable policy objects applied against a page handle.
//!
//! Three independent capability families: authentication, scrolling, and
//! stealth/anti-detection. Each family pairs a trait with a shared state
//! struct so concrete strategies compose the default behaviors instead of
//! inheriting them.

pub mod auth;
pub mod scrolling;
pub mod stealth;

pub use auth::{AuthStrategy, CookieAuth, CredentialAuth, TokenAuth};
pub use scrolling::{PaginationScroller, ScrollStrategy, TimedScroller};
pub use stealth::{StealthStrategy, UserAgentStealth};
