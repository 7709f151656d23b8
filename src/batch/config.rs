//! Batch configuration.

use super::context::{CompletionContext, Inline};
use super::registry::BatchRegistry;
use std::fmt;
use std::sync::Arc;

/// Environment variable read by [`BatchConfig::from_env`].
pub const CANCEL_ON_ERROR_ENV: &str = "REQUEST_BATCH_CANCEL_ON_ERROR";

#[derive(Clone)]
pub struct BatchConfig {
    /// Cancel the remaining requests as soon as one fails.
    pub cancel_when_error_occur: bool,
    /// Where terminal callbacks run. Defaults to [`Inline`].
    pub completion_context: Arc<dyn CompletionContext>,
    /// Keep-alive registry; `None` means the process-wide one.
    pub registry: Option<Arc<BatchRegistry>>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            cancel_when_error_occur: false,
            completion_context: Arc::new(Inline),
            registry: None,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `cancel_when_error_occur` taken from
    /// `REQUEST_BATCH_CANCEL_ON_ERROR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(CANCEL_ON_ERROR_ENV) {
            match parse_flag(&raw) {
                Some(flag) => config.cancel_when_error_occur = flag,
                None => tracing::warn!(
                    var = CANCEL_ON_ERROR_ENV,
                    value = %raw,
                    "ignoring unrecognized boolean"
                ),
            }
        }
        config
    }

    pub fn with_cancel_when_error_occur(mut self, cancel: bool) -> Self {
        self.cancel_when_error_occur = cancel;
        self
    }

    pub fn with_completion_context(mut self, ctx: Arc<dyn CompletionContext>) -> Self {
        self.completion_context = ctx;
        self
    }

    pub fn with_registry(mut self, registry: Arc<BatchRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub(crate) fn resolve_registry(&self) -> Arc<BatchRegistry> {
        self.registry.clone().unwrap_or_else(BatchRegistry::shared)
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("cancel_when_error_occur", &self.cancel_when_error_occur)
            .field("custom_registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert!(!config.cancel_when_error_occur);
        assert!(config.registry.is_none());
    }

    #[test]
    fn test_batch_config_builder() {
        let registry = Arc::new(BatchRegistry::new());
        let config = BatchConfig::new()
            .with_cancel_when_error_occur(true)
            .with_registry(registry.clone());
        assert!(config.cancel_when_error_occur);
        assert!(Arc::ptr_eq(&config.resolve_registry(), &registry));
    }

    #[test]
    fn test_default_registry_is_shared() {
        let config = BatchConfig::default();
        assert!(Arc::ptr_eq(
            &config.resolve_registry(),
            &BatchRegistry::shared()
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
