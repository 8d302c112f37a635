//! Mail-exchange validation with a run-scoped, single-flight cache.
//!
//! Every mail-domain is resolved at most once per run. Concurrent callers
//! asking for the same domain wait on the same in-flight lookup and read its
//! memoized outcome. Failures are cached as "not mail-capable".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use tokio::sync::{Mutex, OnceCell};

use crate::error::{AppError, DnsFailure, Result};
use crate::models::DnsConfig;

/// DNS lookup seam for MX records.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Resolve the mail exchangers of `domain` (hostnames, trailing dot removed).
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>>;
}

/// MX resolver backed by hickory.
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    /// Build a resolver from the system configuration, falling back to the
    /// library's default upstream when it cannot be read.
    pub fn from_config(config: &DnsConfig) -> Self {
        let (resolver_config, mut opts) = match hickory_resolver::system_conf::read_system_conf()
        {
            Ok(system) => system,
            Err(e) => {
                log::warn!("Could not read system DNS configuration ({e}); using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = config.timeout();
        opts.attempts = config.attempts.max(1);

        Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        }
    }

    fn classify(domain: &str, error: ResolveError) -> AppError {
        let kind = match error.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsFailure::NotFound,
            ResolveErrorKind::Timeout => DnsFailure::Timeout,
            _ => DnsFailure::ServFail,
        };
        AppError::dns(domain, kind, error)
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>> {
        let lookup = self
            .resolver
            .mx_lookup(domain)
            .await
            .map_err(|e| Self::classify(domain, e))?;

        Ok(lookup
            .iter()
            .map(|mx| mx.exchange().to_utf8().trim_end_matches('.').to_string())
            .collect())
    }
}

/// Bounded retry for transient lookup failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// No retries: the first failure is final.
    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl From<&DnsConfig> for RetryPolicy {
    fn from(config: &DnsConfig) -> Self {
        Self {
            retries: config.retries,
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Shared "can this domain receive mail" oracle.
pub struct MxValidator {
    resolver: Arc<dyn MxResolver>,
    retry: RetryPolicy,
    cache: Mutex<HashMap<String, Arc<OnceCell<bool>>>>,
}

impl MxValidator {
    pub fn new(resolver: Arc<dyn MxResolver>, retry: RetryPolicy) -> Self {
        Self {
            resolver,
            retry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `domain` has at least one usable MX record.
    pub async fn is_mail_capable(&self, domain: &str) -> bool {
        let key = domain.trim().trim_end_matches('.').to_lowercase();
        if key.is_empty() {
            return false;
        }

        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(key.clone()).or_default())
        };

        *cell.get_or_init(|| self.resolve(&key)).await
    }

    /// Memoized outcome for `domain`, if it has been resolved.
    pub async fn cached(&self, domain: &str) -> Option<bool> {
        let key = domain.trim().trim_end_matches('.').to_lowercase();
        let cache = self.cache.lock().await;
        cache.get(&key).and_then(|cell| cell.get().copied())
    }

    /// Number of domains with a memoized outcome.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|cell| cell.initialized()).count()
    }

    async fn resolve(&self, domain: &str) -> bool {
        let mut attempt = 0;
        loop {
            match self.resolver.lookup_mx(domain).await {
                Ok(exchanges) => {
                    let ok = exchanges.iter().any(|host| !host.is_empty());
                    log::debug!("Domain mx {domain} status {ok}");
                    return ok;
                }
                Err(AppError::Dns { kind, .. })
                    if kind.is_transient() && attempt < self.retry.retries =>
                {
                    attempt += 1;
                    let wait = self.retry.backoff(attempt);
                    log::debug!(
                        "MX lookup for {domain} failed ({kind}); retry {attempt} in {wait:?}"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    log::debug!("Domain mx {domain} status false: {e}");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver answering from a fixed table, counting queries.
    struct FakeResolver {
        queries: AtomicUsize,
        delay: Duration,
        failures_before_success: usize,
    }

    impl FakeResolver {
        fn new() -> Self {
            Self {
                queries: AtomicUsize::new(0),
                delay: Duration::ZERO,
                failures_before_success: 0,
            }
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MxResolver for FakeResolver {
        async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match domain {
                "example.com" => Ok(vec!["mx1.example.com".into()]),
                "null-mx.test" => Ok(vec![String::new()]),
                "flaky.test" if n < self.failures_before_success => {
                    Err(AppError::dns(domain, DnsFailure::Timeout, "timed out"))
                }
                "flaky.test" => Ok(vec!["mx.flaky.test".into()]),
                _ => Err(AppError::dns(domain, DnsFailure::NotFound, "NXDOMAIN")),
            }
        }
    }

    #[tokio::test]
    async fn test_positive_and_negative_outcomes() {
        let validator = MxValidator::new(Arc::new(FakeResolver::new()), RetryPolicy::none());
        assert!(validator.is_mail_capable("example.com").await);
        assert!(validator.is_mail_capable("EXAMPLE.com.").await);
        assert!(!validator.is_mail_capable("nowhere.test").await);
        assert!(!validator.is_mail_capable("null-mx.test").await);
        assert!(!validator.is_mail_capable("").await);
    }

    #[tokio::test]
    async fn test_resolves_each_domain_once() {
        let resolver = Arc::new(FakeResolver::new());
        let validator = MxValidator::new(resolver.clone(), RetryPolicy::none());

        for _ in 0..3 {
            validator.is_mail_capable("example.com").await;
            validator.is_mail_capable("nowhere.test").await;
        }

        assert_eq!(resolver.queries(), 2);
        assert_eq!(validator.cached("example.com").await, Some(true));
        assert_eq!(validator.cached("nowhere.test").await, Some(false));
        assert_eq!(validator.cached("other.test").await, None);
        assert_eq!(validator.cached_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_lookup() {
        let resolver = Arc::new(FakeResolver {
            delay: Duration::from_millis(50),
            ..FakeResolver::new()
        });
        let validator = Arc::new(MxValidator::new(resolver.clone(), RetryPolicy::none()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let validator = Arc::clone(&validator);
                tokio::spawn(async move { validator.is_mail_capable("example.com").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(resolver.queries(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_cached_without_retries() {
        let resolver = Arc::new(FakeResolver {
            failures_before_success: 1,
            ..FakeResolver::new()
        });
        let validator = MxValidator::new(resolver.clone(), RetryPolicy::none());

        assert!(!validator.is_mail_capable("flaky.test").await);
        assert!(!validator.is_mail_capable("flaky.test").await);
        assert_eq!(resolver.queries(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_with_policy() {
        let resolver = Arc::new(FakeResolver {
            failures_before_success: 2,
            ..FakeResolver::new()
        });
        let retry = RetryPolicy {
            retries: 2,
            initial_backoff: Duration::from_millis(1),
        };
        let validator = MxValidator::new(resolver.clone(), retry);

        assert!(validator.is_mail_capable("flaky.test").await);
        assert_eq!(resolver.queries(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_never_retried() {
        let resolver = Arc::new(FakeResolver::new());
        let retry = RetryPolicy {
            retries: 3,
            initial_backoff: Duration::from_millis(1),
        };
        let validator = MxValidator::new(resolver.clone(), retry);

        assert!(!validator.is_mail_capable("nowhere.test").await);
        assert_eq!(resolver.queries(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryPolicy {
            retries: 3,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
    }
}
