//! Catalog configuration.

use std::time::Duration;

/// Retry policy for transactions that hit transient store conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 = no retries).
    pub max_retries: u32,
    /// Base delay between retries in milliseconds (exponential backoff).
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Creates a retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base backoff delay.
    #[must_use]
    pub const fn base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Sets the backoff ceiling.
    #[must_use]
    pub const fn max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Backoff before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // 1 << 63 is the largest shift that fits in u64
        let shift = attempt.min(63);
        let delay_ms = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Configuration for a catalog instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Retry policy for every transaction the catalog opens.
    pub retry: RetryConfig,

    /// Largest genetic degree used when computing family roles.
    pub family_role_degree: u32,

    /// Whether annotation queries must name a variable set the study defines.
    pub strict_annotation_queries: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            family_role_degree: 2,
            strict_annotation_queries: false,
        }
    }
}

impl CatalogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the degree used for family role computation.
    #[must_use]
    pub const fn family_role_degree(mut self, degree: u32) -> Self {
        self.family_role_degree = degree;
        self
    }

    /// Sets whether annotation queries are checked against variable sets.
    #[must_use]
    pub const fn strict_annotation_queries(mut self, value: bool) -> Self {
        self.strict_annotation_queries = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.family_role_degree, 2);
        assert!(!config.strict_annotation_queries);
    }

    #[test]
    fn builder_pattern() {
        let config = CatalogConfig::new()
            .retry(RetryConfig::no_retry())
            .family_role_degree(3)
            .strict_annotation_queries(true);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.family_role_degree, 3);
        assert!(config.strict_annotation_queries);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let retry = RetryConfig::new().base_delay_ms(10).max_delay_ms(35);
        assert_eq!(retry.delay_for(0), Duration::from_millis(10));
        assert_eq!(retry.delay_for(1), Duration::from_millis(20));
        assert_eq!(retry.delay_for(2), Duration::from_millis(35));
        assert_eq!(retry.delay_for(200), Duration::from_millis(35));
    }
}
