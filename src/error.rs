use thiserror::Error;

/// Error taxonomy for the fetching framework
#[derive(Error, Debug)]
pub enum FetchError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration value at '{path}': {rule}")]
    ConfigValidation { path: String, rule: String },

    // Lifecycle errors
    #[error("Initialization error: {message}")]
    Initialization { message: String },

    // Data retrieval errors
    #[error("Fetching error: {message}")]
    Fetching {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Extraction error: {message}")]
    Extraction { message: String },

    // Transport errors from the page handle
    #[error("Page error: {message}")]
    Page { message: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    // Strategy errors
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Scrolling error: {message}")]
    Scrolling { message: String },

    #[error("Stealth error: {message}")]
    Stealth { message: String },
}

impl FetchError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a configuration-validation error naming the offending dot-path
    pub fn config_validation(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::ConfigValidation { path: path.into(), rule: rule.into() }
    }

    /// Create an initialization error
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization { message: message.into() }
    }

    /// Create a fetching error without an underlying cause
    pub fn fetching(message: impl Into<String>) -> Self {
        Self::Fetching { message: message.into(), source: None }
    }

    /// Create a fetching error preserving the original failure as cause
    pub fn fetching_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fetching {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction { message: message.into() }
    }

    /// Create a page transport error
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page { message: message.into() }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Create a scrolling error
    pub fn scrolling(message: impl Into<String>) -> Self {
        Self::Scrolling { message: message.into() }
    }

    /// Create a stealth error
    pub fn stealth(message: impl Into<String>) -> Self {
        Self::Stealth { message: message.into() }
    }

    /// Whether the retry loop may re-attempt after this error.
    ///
    /// Only transport-level failures are retryable; configuration and
    /// lifecycle errors propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Page { .. } | Self::Timeout { .. })
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } | Self::ConfigValidation { .. } => "configuration",
            Self::Initialization { .. } => "initialization",
            Self::Fetching { .. } | Self::Extraction { .. } => "data",
            Self::Page { .. } | Self::Timeout { .. } => "transport",
            Self::Authentication { .. } | Self::Scrolling { .. } | Self::Stealth { .. } => {
                "strategy"
            }
        }
    }
}

/// Result type alias for the fetching framework
pub type Result<T> = std::result::Result<T, FetchError>;
