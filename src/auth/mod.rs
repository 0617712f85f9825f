//! Access-token coordination for the connection handshake.
//!
//! The coordinator caches the last token and coalesces concurrent refreshes
//! into a single in-flight fetch whose outcome every waiter shares. A failed
//! refresh is an authentication failure the connection manager must not
//! schedule-retry.

use crate::types::constants::DEFAULT_TOKEN_REFRESH_LEEWAY;
use crate::types::error::{RealtimeError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// An access token and its optional expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: Option<Instant>,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(value: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }
}

/// Source of fresh access tokens, injected at construction.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<Token>;
}

/// A provider that always returns the same token. Useful for service
/// credentials that never expire.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self) -> Result<Token> {
        Ok(Token::new(self.token.clone()))
    }
}

type SharedFetch = Shared<BoxFuture<'static, std::result::Result<Token, String>>>;

struct CoordinatorInner {
    provider: Arc<dyn TokenProvider>,
    leeway: Duration,
    cached: Mutex<Option<Token>>,
    inflight: Mutex<Option<SharedFetch>>,
}

/// Single-flight access-token cache.
#[derive(Clone)]
pub struct TokenCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl TokenCoordinator {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                provider,
                leeway: Duration::from_millis(DEFAULT_TOKEN_REFRESH_LEEWAY),
                cached: Mutex::new(None),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// How long before expiry a cached token counts as stale.
    pub fn with_leeway(self, leeway: Duration) -> Self {
        let inner = Arc::new(CoordinatorInner {
            provider: Arc::clone(&self.inner.provider),
            leeway,
            cached: Mutex::new(self.inner.cached.lock().clone()),
            inflight: Mutex::new(None),
        });
        Self { inner }
    }

    /// Returns a current token, refreshing through the provider if the cached
    /// one is missing or within the expiry leeway.
    ///
    /// Callers arriving while a refresh is in flight await the same fetch and
    /// observe the same outcome; a rejected refresh rejects every waiter.
    pub async fn get_valid_token(&self) -> Result<String> {
        {
            let cached = self.inner.cached.lock();
            if let Some(token) = cached.as_ref() {
                if !needs_refresh(token, self.inner.leeway) {
                    return Ok(token.value.clone());
                }
            }
        }

        let fetch = {
            let mut inflight = self.inner.inflight.lock();
            if let Some(fetch) = inflight.as_ref() {
                fetch.clone()
            } else {
                let provider = Arc::clone(&self.inner.provider);
                let weak = Arc::downgrade(&self.inner);
                let fetch: SharedFetch = async move {
                    let result = provider.fetch_token().await.map_err(|e| e.to_string());
                    if let Some(inner) = weak.upgrade() {
                        *inner.cached.lock() = result.as_ref().ok().cloned();
                        inner.inflight.lock().take();
                    }
                    result
                }
                .boxed()
                .shared();
                *inflight = Some(fetch.clone());
                fetch
            }
        };

        match fetch.await {
            Ok(token) => Ok(token.value),
            Err(message) => Err(RealtimeError::Auth(message)),
        }
    }

    /// Drop the cached token so the next call refreshes.
    pub fn invalidate(&self) {
        self.inner.cached.lock().take();
    }
}

fn needs_refresh(token: &Token, leeway: Duration) -> bool {
    match token.expires_at {
        Some(at) => at.saturating_duration_since(Instant::now()) <= leeway,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
        expires_in: Option<Duration>,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
                expires_in: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self) -> Result<Token> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(RealtimeError::Auth("refresh token rejected".to_string()));
            }
            let value = format!("token-{}", call);
            Ok(match self.expires_in {
                Some(ttl) => Token::expiring_at(value, Instant::now() + ttl),
                None => Token::new(value),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(50),
            ..CountingProvider::new()
        });
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>);

        let (a, b, c) = tokio::join!(
            coordinator.get_valid_token(),
            coordinator.get_valid_token(),
            coordinator.get_valid_token(),
        );

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), "token-0");
        assert_eq!(b.unwrap(), "token-0");
        assert_eq!(c.unwrap(), "token-0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_rejects_every_waiter() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(50),
            ..CountingProvider::failing()
        });
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>);

        let (a, b) = tokio::join!(coordinator.get_valid_token(), coordinator.get_valid_token());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(a, Err(RealtimeError::Auth(_))));
        assert!(matches!(b, Err(RealtimeError::Auth(_))));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let provider = Arc::new(CountingProvider::new());
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>);

        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-0");
        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-0");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let provider = Arc::new(CountingProvider::failing());
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>);

        assert!(coordinator.get_valid_token().await.is_err());
        assert!(coordinator.get_valid_token().await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_refreshed_ahead_of_expiry() {
        let provider = Arc::new(CountingProvider {
            expires_in: Some(Duration::from_secs(60)),
            ..CountingProvider::new()
        });
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>)
            .with_leeway(Duration::from_secs(30));

        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-0");

        // Still comfortably before the leeway boundary
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-0");

        // Inside the leeway window the token counts as stale
        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let provider = Arc::new(CountingProvider::new());
        let coordinator = TokenCoordinator::new(Arc::clone(&provider) as Arc<dyn TokenProvider>);

        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-0");
        coordinator.invalidate();
        assert_eq!(coordinator.get_valid_token().await.unwrap(), "token-1");
    }
}
