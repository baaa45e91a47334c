use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::jwk::PublicKeyUse;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::VerifierConfig;
use crate::error::fetch_jwks_error;
use crate::error::Error;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Value>,
}

/// A public key published by the identity provider
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The algorithm this key verifies. Always RS256 today.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Build a signing key from a JWK, skipping keys this service never accepts
    fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let key_id = jwk.common.key_id.clone()?;

        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            debug!(kid = %key_id, "skipping encryption key");
            return None;
        }

        match &jwk.common.key_algorithm {
            None | Some(KeyAlgorithm::RS256) => {}
            Some(other) => {
                debug!(kid = %key_id, alg = ?other, "skipping key with unsupported algorithm");
                return None;
            }
        }

        let AlgorithmParameters::RSA(params) = &jwk.algorithm else {
            debug!(kid = %key_id, "skipping non-RSA key");
            return None;
        };

        match DecodingKey::from_rsa_components(&params.n, &params.e) {
            Ok(decoding_key) => Some(Self {
                key_id,
                algorithm: Algorithm::RS256,
                decoding_key,
            }),
            Err(error) => {
                warn!(kid = %key_id, %error, "skipping RSA key with invalid components");
                None
            }
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Snapshot of the identity provider's keys taken at one fetch
#[derive(Debug)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl KeySet {
    fn new(keys: Vec<SigningKey>) -> Self {
        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    /// Look up a key by exact `kid`
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.key_id == kid)
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// Why a refresh is being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    /// The cached set is missing or past its TTL; a stale set beats an error
    Expired,
    /// A `kid` was not found in the cached set
    UnknownKey,
    /// Explicit request, not subject to the failure backoff
    Forced,
}

/// Outcome of the last failed fetch, cleared by the next successful one
#[derive(Debug)]
struct FailedFetch {
    at: Instant,
    message: String,
}

/// Fetches and caches the JWKS of one issuer
///
/// The cached [`KeySet`] sits behind an `Arc` and is swapped whole on refresh, so
/// readers see either the previous or the next complete set. Refreshes are
/// serialized: callers that miss the cache at the same time share one fetch,
/// whether it succeeds or fails. After a failure no new fetch is attempted for
/// `min_refresh_interval` while a cached set exists.
pub struct KeyProvider {
    jwks_url: String,
    client: Client,
    ttl: Duration,
    fetch_timeout: Duration,
    min_refresh_interval: Duration,
    current: RwLock<Option<Arc<KeySet>>>,
    refresh_lock: Mutex<Option<FailedFetch>>,
    attempts: AtomicU64,
}

impl KeyProvider {
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        let client = match &config.http_client {
            Some(client) => client.clone(),
            None => Client::builder()
                .timeout(config.fetch_timeout)
                .build()
                .map_err(fetch_jwks_error)?,
        };

        Ok(Self {
            jwks_url: config.jwks_url.clone(),
            client,
            ttl: config.jwks_cache_ttl,
            fetch_timeout: config.fetch_timeout,
            min_refresh_interval: config.min_refresh_interval,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
        })
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// The cached key set, if any, regardless of age
    pub async fn current(&self) -> Option<Arc<KeySet>> {
        self.current.read().await.clone()
    }

    /// Get the key set, fetching it when missing or older than the TTL
    ///
    /// When a refresh of an expired set fails the stale set is returned, so keys
    /// that were once available stay available during a provider outage.
    pub async fn get_signing_keys(&self) -> Result<Arc<KeySet>> {
        if let Some(keys) = self.current().await {
            if !keys.is_expired(self.ttl) {
                return Ok(keys);
            }
        }

        let ttl = self.ttl;
        self.refresh_when(|keys| keys.is_expired(ttl), RefreshReason::Expired)
            .await
    }

    /// Resolve the key for `kid`
    ///
    /// A miss against a key set older than the minimum refresh interval forces
    /// one refetch before giving up, which picks up rotated keys.
    pub async fn get_key(&self, kid: &str) -> Result<SigningKey> {
        let keys = self.get_signing_keys().await?;
        if let Some(key) = keys.get(kid) {
            return Ok(key.clone());
        }

        if keys.age() < self.min_refresh_interval {
            return Err(Error::UnknownSigningKey(kid.to_string()));
        }

        debug!(kid, "unknown key id, refreshing JWKS");
        let seen = keys.fetched_at();
        let min_age = self.min_refresh_interval;
        let keys = self
            .refresh_when(
                |current| current.fetched_at() == seen && current.age() >= min_age,
                RefreshReason::UnknownKey,
            )
            .await?;

        keys.get(kid)
            .cloned()
            .ok_or_else(|| Error::UnknownSigningKey(kid.to_string()))
    }

    /// Fetch the key set now and replace the cached one
    pub async fn refresh(&self) -> Result<Arc<KeySet>> {
        self.refresh_when(|_| true, RefreshReason::Forced).await
    }

    /// Drop the cached key set; the next lookup fetches again
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        debug!(url = %self.jwks_url, "JWKS cache invalidated");
    }

    /// Refresh the key set every `every`, until the returned handle is aborted
    pub fn spawn_refresh_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = provider.refresh().await {
                    warn!(%error, "background JWKS refresh failed");
                }
            }
        })
    }

    /// Single-flight refresh. `needs_refresh` is re-evaluated once the lock is
    /// held. Callers that queued behind another attempt reuse its outcome
    /// instead of fetching again.
    async fn refresh_when<F>(&self, needs_refresh: F, reason: RefreshReason) -> Result<Arc<KeySet>>
    where
        F: Fn(&KeySet) -> bool,
    {
        let seen_attempts = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;

        let previous = self.current().await;
        if let Some(keys) = &previous {
            if !needs_refresh(keys) {
                return Ok(Arc::clone(keys));
            }
        }

        let attempted_while_waiting = self.attempts.load(Ordering::Acquire) != seen_attempts;
        let backing_off = reason != RefreshReason::Forced
            && previous.is_some()
            && last_failure
                .as_ref()
                .is_some_and(|failure| failure.at.elapsed() < self.min_refresh_interval);

        if attempted_while_waiting || backing_off {
            if let Some(failure) = last_failure.as_ref() {
                return match previous {
                    Some(stale) if reason == RefreshReason::Expired => Ok(stale),
                    _ => Err(Error::KeyFetchFailed(failure.message.clone())),
                };
            }
            if let Some(keys) = previous {
                return Ok(keys);
            }
        }

        self.attempts.fetch_add(1, Ordering::AcqRel);
        match self.fetch().await {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                *self.current.write().await = Some(Arc::clone(&fresh));
                *last_failure = None;
                info!(url = %self.jwks_url, keys = fresh.len(), "JWKS refreshed");
                Ok(fresh)
            }
            Err(error) => {
                let message = match &error {
                    Error::KeyFetchFailed(message) => message.clone(),
                    other => other.to_string(),
                };
                *last_failure = Some(FailedFetch {
                    at: Instant::now(),
                    message,
                });
                match previous {
                    Some(stale) if reason == RefreshReason::Expired => {
                        warn!(
                            %error,
                            age_secs = stale.age().as_secs(),
                            "JWKS refresh failed, serving stale key set"
                        );
                        Ok(stale)
                    }
                    _ => Err(error),
                }
            }
        }
    }

    async fn fetch(&self) -> Result<KeySet> {
        debug!(url = %self.jwks_url, "fetching JWKS");
        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(fetch_jwks_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::KeyFetchFailed(format!(
                "JWKS endpoint returned HTTP {status}"
            )));
        }

        let document: JwksDocument = response.json().await.map_err(fetch_jwks_error)?;
        let keys = parse_keys(document.keys);

        if keys.is_empty() {
            return Err(Error::KeyFetchFailed(
                "JWKS contains no usable RS256 signing keys".to_string(),
            ));
        }

        Ok(KeySet::new(keys))
    }
}

/// Parse each entry on its own so one unsupported key does not discard the rest
fn parse_keys(raw: Vec<Value>) -> Vec<SigningKey> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
            Ok(jwk) => SigningKey::from_jwk(&jwk),
            Err(error) => {
                debug!(%error, "skipping unparseable JWK");
                None
            }
        })
        .collect()
}
