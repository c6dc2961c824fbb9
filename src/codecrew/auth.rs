//! Credential acquisition for provider clients.
//!
//! Providers are reached with a bearer secret that may expire (a managed
//! identity token) or may not (a plain API key). Both cases go through the
//! same [`TokenCache`]: every provider call asks the cache for a bearer, and
//! the cache refreshes through its [`TokenProvider`] only when the cached
//! token is missing or expired. Auth failure is fatal to the call that
//! triggered it.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// A credential could not be acquired. Fatal to the invoking call path.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        AuthError {
            message: message.into(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failure: {}", self.message)
    }
}

impl Error for AuthError {}

/// A bearer secret together with its expiry instant.
#[derive(Clone, Debug)]
pub struct BearerToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Source of fresh bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self) -> Result<BearerToken, AuthError>;
}

/// Provider for plain API keys, which never expire.
pub struct StaticTokenProvider {
    secret: String,
}

impl StaticTokenProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        StaticTokenProvider {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch(&self) -> Result<BearerToken, AuthError> {
        Ok(BearerToken {
            secret: self.secret.clone(),
            // far enough out that the cache never refreshes
            expires_at: Utc::now() + Duration::days(36_500),
        })
    }
}

/// Caches the most recent bearer token and refreshes it through the provider
/// only when missing or expired.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    cached: Mutex<Option<BearerToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        TokenCache {
            provider,
            cached: Mutex::new(None),
        }
    }

    /// The current bearer secret, refreshed if the cached token has expired.
    pub async fn bearer(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(now) {
                return Ok(token.secret.clone());
            }
        }
        let fresh = self.provider.fetch().await?;
        let secret = fresh.secret.clone();
        *cached = Some(fresh);
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        fetches: AtomicUsize,
        ttl: Duration,
    }

    impl CountingProvider {
        fn new(ttl: Duration) -> Self {
            CountingProvider {
                fetches: AtomicUsize::new(0),
                ttl,
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch(&self) -> Result<BearerToken, AuthError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(BearerToken {
                secret: format!("token-{}", n),
                expires_at: Utc::now() + self.ttl,
            })
        }
    }

    #[tokio::test]
    async fn unexpired_token_is_reused() {
        let provider = Arc::new(CountingProvider::new(Duration::hours(1)));
        let cache = TokenCache::new(provider.clone());

        let first = cache.bearer().await.unwrap();
        let second = cache.bearer().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-1");
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_refresh() {
        let provider = Arc::new(CountingProvider::new(Duration::seconds(-1)));
        let cache = TokenCache::new(provider.clone());

        let first = cache.bearer().await.unwrap();
        let second = cache.bearer().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-2");
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        async fn fetch(&self) -> Result<BearerToken, AuthError> {
            Err(AuthError::new("identity endpoint unreachable"))
        }
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_auth_error() {
        let cache = TokenCache::new(Arc::new(FailingProvider));
        let err = cache.bearer().await.unwrap_err();
        assert!(err.to_string().contains("identity endpoint unreachable"));
    }
}
