//! Blocked-request circuit breaker.
//!
//! Stops a single site crawl once the site keeps refusing access, so one
//! hostile site cannot burn through the request budget of the run.
//!
//! > A crawl is aborted when **10** requests have failed with an
//! > access-denied response. Other sites are unaffected.

use crate::error::AppError;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Access-denied failures tolerated before the crawl is aborted. Default: 10
    pub max_blocked: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { max_blocked: 10 }
    }
}

/// Per-crawl counter of access-denied failures.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    blocked: usize,
}

/// Result of recording a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Failure unrelated to access control
    Ignored,
    /// Access denied, still below the threshold
    Counted { blocked: usize },
    /// Threshold reached - abort the crawl
    Tripped { blocked: usize },
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self { config, blocked: 0 }
    }

    /// Record a failed request.
    pub fn record(&mut self, error: &AppError) -> CircuitBreakerResult {
        if !error.is_access_denied() {
            return CircuitBreakerResult::Ignored;
        }

        self.blocked += 1;
        if self.is_tripped() {
            CircuitBreakerResult::Tripped {
                blocked: self.blocked,
            }
        } else {
            CircuitBreakerResult::Counted {
                blocked: self.blocked,
            }
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.blocked >= self.config.max_blocked
    }

    pub fn blocked(&self) -> usize {
        self.blocked
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
