use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use tracing::debug;

use crate::claims::TokenClaims;
use crate::config::VerifierConfig;
use crate::error::jwt_error;
use crate::error::Error;
use crate::error::Result;
use crate::key_provider::KeyProvider;
use crate::key_provider::SigningKey;

/// Trait for bearer token verification
#[async_trait]
pub trait VerifyToken: Send + Sync {
    /// Verify a token and return its claims
    async fn verify(&self, token: &str) -> Result<TokenClaims>;
}

/// Verifies tokens issued by one user pool for one client
///
/// Stateless apart from the shared [`KeyProvider`] cache.
pub struct TokenVerifier {
    key_provider: Arc<KeyProvider>,
    audience: String,
}

impl TokenVerifier {
    /// Create a verifier with its own key provider
    pub fn new(config: VerifierConfig) -> Result<Self> {
        let key_provider = Arc::new(KeyProvider::new(&config)?);
        Self::with_key_provider(key_provider, config.audience)
    }

    /// Create a verifier on top of an existing key provider
    pub fn with_key_provider(
        key_provider: Arc<KeyProvider>,
        audience: impl Into<String>,
    ) -> Result<Self> {
        let audience = audience.into();
        if audience.is_empty() {
            return Err(Error::InvalidConfig {
                key: "audience",
                message: "an expected audience must be configured".to_string(),
            });
        }

        Ok(Self {
            key_provider,
            audience,
        })
    }

    pub fn key_provider(&self) -> &Arc<KeyProvider> {
        &self.key_provider
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Check the signature with the resolved key and decode the payload
    fn decode_with_key(&self, token: &str, header: &Header, key: &SigningKey) -> Result<TokenClaims> {
        // The key decides the algorithm, not the token
        if header.alg != key.algorithm() {
            return Err(Error::SignatureInvalid(format!(
                "token declares {:?} but key {} verifies {:?}",
                header.alg,
                key.key_id(),
                key.algorithm()
            )));
        }

        let token_data = decode::<TokenClaims>(token, key.decoding_key(), &validation_for(key))
            .map_err(jwt_error)?;

        Ok(token_data.claims)
    }

    fn check_claims(&self, claims: &TokenClaims) -> Result<()> {
        let exp = claims
            .exp()
            .ok_or_else(|| Error::MalformedToken("missing 'exp' claim".to_string()))?;

        if exp <= Utc::now().timestamp() {
            return Err(Error::TokenExpired(exp));
        }

        if !claims.has_audience(&self.audience) {
            return Err(Error::AudienceMismatch);
        }

        Ok(())
    }
}

#[async_trait]
impl VerifyToken for TokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims> {
        let header = parse_header(token)?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| Error::MalformedToken("missing 'kid' in token header".to_string()))?;

        let key = self.key_provider.get_key(kid).await?;
        let claims = self.decode_with_key(token, &header, &key)?;
        self.check_claims(&claims)?;

        debug!(kid, sub = claims.sub().unwrap_or_default(), "token verified");
        Ok(claims)
    }
}

/// Read the header without verifying anything
fn parse_header(token: &str) -> Result<Header> {
    if token.split('.').count() != 3 {
        return Err(Error::MalformedToken(
            "token must have three dot-separated segments".to_string(),
        ));
    }

    decode_header(token).map_err(|error| Error::MalformedToken(error.to_string()))
}

/// Signature-only validation; expiry and audience are checked in `check_claims`
fn validation_for(key: &SigningKey) -> Validation {
    let mut validation = Validation::new(key.algorithm());
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}
