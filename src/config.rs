use crate::core::{DbError, Result};
use crate::facade::pagination::{PageRequest, PageWindow};
use log::info;
use std::time::Duration;

const ENV_PAGE_MAX_LIMIT: &str = "ENTITYDB_PAGE_MAX_LIMIT";
const ENV_DEFAULT_PAGE_LIMIT: &str = "ENTITYDB_DEFAULT_PAGE_LIMIT";
const ENV_WAIT_TIMEOUT_SECS: &str = "ENTITYDB_WAIT_TIMEOUT_SECS";
const ENV_STRICT_FILTERS: &str = "ENTITYDB_STRICT_FILTERS";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Ceiling applied to every page limit
    pub page_max_limit: usize,

    /// Limit used when the caller gives none
    pub default_page_limit: usize,

    /// Default bound on completion waits; `None` waits forever
    pub wait_timeout: Option<Duration>,

    /// Reject unusable filters instead of dropping them
    pub strict_filters: bool,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self {
            page_max_limit: 100,
            default_page_limit: 10,
            wait_timeout: Some(Duration::from_secs(180)),
            strict_filters: false,
        }
    }

    /// Set the page limit ceiling
    pub fn page_max_limit(mut self, max: usize) -> Self {
        self.page_max_limit = max;
        self
    }

    /// Set the default page limit
    pub fn default_page_limit(mut self, limit: usize) -> Self {
        self.default_page_limit = limit;
        self
    }

    /// Set the default wait timeout
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Wait for completion signals without a bound
    pub fn unbounded_wait(mut self) -> Self {
        self.wait_timeout = None;
        self
    }

    /// Turn strict filter compilation on or off
    pub fn strict_filters(mut self, strict: bool) -> Self {
        self.strict_filters = strict;
        self
    }

    /// Defaults overridden by `ENTITYDB_*` environment variables.
    ///
    /// `ENTITYDB_WAIT_TIMEOUT_SECS=0` selects an unbounded wait.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(raw) = lookup(ENV_PAGE_MAX_LIMIT) {
            config.page_max_limit = parse_number(ENV_PAGE_MAX_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_PAGE_LIMIT) {
            config.default_page_limit = parse_number(ENV_DEFAULT_PAGE_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WAIT_TIMEOUT_SECS) {
            config.wait_timeout = match parse_number(ENV_WAIT_TIMEOUT_SECS, &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs as u64)),
            };
        }
        if let Some(raw) = lookup(ENV_STRICT_FILTERS) {
            config.strict_filters = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(DbError::ParseError(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_STRICT_FILTERS, raw
                    )));
                }
            };
        }

        config.validate()?;
        info!(
            "service config: page_max_limit={}, default_page_limit={}, wait_timeout={:?}, strict_filters={}",
            config.page_max_limit,
            config.default_page_limit,
            config.wait_timeout,
            config.strict_filters
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_max_limit == 0 {
            return Err(DbError::Validation("page_max_limit must be at least 1".into()));
        }
        if self.default_page_limit == 0 || self.default_page_limit > self.page_max_limit {
            return Err(DbError::Validation(format!(
                "default_page_limit must be between 1 and {}",
                self.page_max_limit
            )));
        }
        Ok(())
    }

    /// Clamp a caller's page request against this configuration.
    pub fn window(&self, request: PageRequest) -> PageWindow {
        let limit = request
            .limit
            .unwrap_or_else(|| i64::try_from(self.default_page_limit).unwrap_or(i64::MAX));
        PageWindow::clamp(request.offset.unwrap_or(0), limit, self.page_max_limit)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| DbError::ParseError(format!("{} must be a non-negative integer: {}", key, e)))
}
