// searchplan-core/src/config.rs
//! Process-wide compiler configuration.
//!
//! Read-only once a compilation starts; every search takes it by reference.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SearchError};
use crate::logging::LogLevel;

/// Environment override for [`SearchConfig::default_page_size`]
pub const PAGE_SIZE_ENV_VAR: &str = "SEARCHPLAN_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Window size used when neither the conditions nor the request name one
    pub default_page_size: u64,
    /// Bind page=1 / page_size=default when the request carries no paging
    pub paginate_by_default: bool,
    /// Optional log level name ("warn", "debug", ...)
    pub log_level: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_page_size: 15,
            paginate_by_default: false,
            log_level: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_paginate_by_default(mut self, enabled: bool) -> Self {
        self.paginate_by_default = enabled;
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)?.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(PAGE_SIZE_ENV_VAR) {
            self.default_page_size = raw.trim().parse().map_err(|_| {
                SearchError::Config(format!("{} must be an integer, got '{}'", PAGE_SIZE_ENV_VAR, raw))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 {
            return Err(SearchError::Config(
                "default_page_size must be greater than zero".to_string(),
            ));
        }
        if let Some(level) = &self.log_level {
            if LogLevel::parse(level).is_none() {
                return Err(SearchError::Config(format!("Unknown log level '{}'", level)));
            }
        }
        Ok(())
    }

    /// Configured log level, if any
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level.as_deref().and_then(LogLevel::parse)
    }
}
