//! # AlgoDatta API
//!
//! Backend for the AlgoDatta dashboard. Users sign in through an AWS Cognito
//! hosted UI; the service verifies the resulting ID and access tokens against
//! the user pool's JWKS and exposes a small REST API on top.
//!
//! ## Features
//!
//! - RS256 token verification with a TTL-cached, single-flight JWKS key provider
//! - Refetch on unknown `kid`, so signing-key rotation needs no restart
//! - Authorization-code exchange against the hosted UI token endpoint
//! - Single-row broker link persistence, in memory or in SQLite
//! - An axum router with bearer/cookie authentication and JSON error bodies
//!
//! ## Example
//!
//! ```rust,no_run
//! use algodatta_api::{TokenVerifier, UserPool, VerifierConfig, VerifyToken};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = UserPool::new("ap-south-1", "ap-south-1_AbCdEf123");
//!     let config = VerifierConfig::new(&pool, "my-app-client-id")
//!         .with_cache_ttl(Duration::from_secs(1800));
//!
//!     let verifier = TokenVerifier::new(config)?;
//!
//!     let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Ii4uLiJ9...";
//!     let claims = verifier.verify(token).await?;
//!
//!     println!("user: {:?}", claims.username());
//!
//!     Ok(())
//! }
//! ```

pub mod broker;
mod claims;
mod config;
mod error;
mod key_provider;
mod oauth;
pub mod server;
pub mod settings;
mod verifier;

// Re-exports for public API
pub use broker::BrokerLink;
pub use broker::BrokerStore;
pub use claims::TokenClaims;
pub use config::UserPool;
pub use config::VerifierConfig;
pub use error::Error;
pub use error::Result;
pub use key_provider::KeyProvider;
pub use key_provider::KeySet;
pub use key_provider::SigningKey;
pub use oauth::OAuthClient;
pub use oauth::TokenSet;
pub use settings::Settings;
pub use verifier::TokenVerifier;
pub use verifier::VerifyToken;
