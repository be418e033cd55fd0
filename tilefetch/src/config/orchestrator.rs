//! Fetch orchestrator configuration.

use crate::network::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Default for persisting network results to the cache.
pub const DEFAULT_PERSIST_TO_CACHE: bool = true;

/// Behavioural settings for a fetch orchestrator.
///
/// # Example
///
/// ```
/// use tilefetch::config::OrchestratorConfig;
///
/// let config = OrchestratorConfig::new()
///     .with_persist_to_cache(false)
///     .with_debug_output(true);
/// assert!(!config.persist_to_cache());
/// assert!(config.debug_output());
/// assert_eq!(config.http_timeout_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Write network results to the cache store
    persist_to_cache: bool,
    /// Log every fetch at info level instead of debug
    debug_output: bool,
    /// Timeout for one HTTP request (in seconds)
    http_timeout_secs: u64,
    /// User-Agent header for tile requests
    user_agent: String,
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether fetched tiles are written to the cache.
    ///
    /// Has no effect when the orchestrator has no cache store.
    /// Default: true.
    pub fn with_persist_to_cache(mut self, persist: bool) -> Self {
        self.persist_to_cache = persist;
        self
    }

    /// Raise per-fetch logging from debug to info.
    pub fn with_debug_output(mut self, debug: bool) -> Self {
        self.debug_output = debug;
        self
    }

    /// Set the HTTP timeout in seconds. Default: 30 seconds.
    pub fn with_http_timeout_secs(mut self, timeout: u64) -> Self {
        self.http_timeout_secs = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn persist_to_cache(&self) -> bool {
        self.persist_to_cache
    }

    pub fn debug_output(&self) -> bool {
        self.debug_output
    }

    pub fn http_timeout_secs(&self) -> u64 {
        self.http_timeout_secs
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            persist_to_cache: DEFAULT_PERSIST_TO_CACHE,
            debug_output: false,
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
