use std::time::Duration;

use reqwest::Client;

/// Cognito user pool whose keys sign the tokens we accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPool {
    pub region: String,
    pub user_pool_id: String,
}

impl UserPool {
    pub fn new(region: impl Into<String>, user_pool_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            user_pool_id: user_pool_id.into(),
        }
    }

    /// Issuer URL of the pool, e.g. `https://cognito-idp.ap-south-1.amazonaws.com/ap-south-1_abc`
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    /// Location of the pool's published signing keys
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer())
    }
}

/// Configuration for the token verifier and its key provider
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// URL of the JWKS document
    pub(crate) jwks_url: String,
    /// Expected `aud` claim, the OAuth client id
    pub(crate) audience: String,
    /// Time-to-live for the cached key set (default: 1 hour)
    pub(crate) jwks_cache_ttl: Duration,
    /// Upper bound on a single JWKS fetch (default: 10 seconds)
    pub(crate) fetch_timeout: Duration,
    /// Minimum key set age before an unknown `kid` forces a refetch (default: 60 seconds)
    pub(crate) min_refresh_interval: Duration,
    /// Optional custom HTTP client for fetching JWKS
    /// If not provided, a default client will be created
    pub(crate) http_client: Option<Client>,
}

const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MIN_REFRESH_INTERVAL_SECS: u64 = 60;

impl VerifierConfig {
    /// Create a configuration for tokens issued by the given user pool to the given client
    pub fn new(user_pool: &UserPool, audience: impl Into<String>) -> Self {
        Self::with_jwks_url(user_pool.jwks_url(), audience)
    }

    /// Create a configuration that fetches keys from an explicit JWKS URL
    pub fn with_jwks_url(jwks_url: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            audience: audience.into(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECS),
            http_client: None,
        }
    }

    /// Set the JWKS cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Set the timeout applied to every JWKS request
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set how old the key set must be before an unknown key id triggers a refetch
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }
}
