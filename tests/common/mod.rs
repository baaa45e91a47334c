#![allow(dead_code)]

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mockito::ServerGuard;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

pub const AUDIENCE: &str = "client123";
pub const JWKS_PATH: &str = "/ap-south-1_TestPool/.well-known/jwks.json";

/// Test RSA key pair with its public JWK
pub struct TestKeyPair {
    pub encoding_key: EncodingKey,
    pub kid: String,
    pub jwk: Value,
}

// Fresh test keys, DO NOT use in production
const PRIMARY_PEM: &str = include_str!("../fixtures/signing_key_primary.pem");
const ROTATED_PEM: &str = include_str!("../fixtures/signing_key_rotated.pem");

const PRIMARY_N: &str = "lHeMTAT0NgtE2enBiIpZka4qZMR63PLIWTpNtXqFGc0XzTHITAavpw6tfo9r13gbbnhxNHlQIvnIZJSfI4rbUxcVi3BW6-V797mb3lKWQuCJgAmCwT7BN0RoYi-ayfkExilv5HBHyRww3Q1u3ZAAkNYxDdN2HoNAG3U-ty95jE0-k-eT9BJRn0_XRmr2K9LAGcpgyFWH8KAaXnIWNQPWO37u9_AZBDfIJx3C2hjjG4se2PTHuV3Yf7uWXeLxg-BQ_JvxTa-VGqq2ENH4JGNQXFK871NENSE4LFxr_rtUV4WM-YN8C8HzS41HnTcN1-ZMQs68gzZydh5lqOM9MNfq1w";
const ROTATED_N: &str = "soSrKaXN5XK5uuz8KVHhBueXBbUbut8dI4Du0B_NYP9JC32P4fOzAh_yujPlYQMTZt36yD6fJAUwXXDjchF4NRxnZ9eA3Zut5rYH0_AAZZGAFNb7TGzyhmsxB8bEbokChRuWxrqragO0PZF7WhjRZ3pG_ZWRTAfU3c2_nUKb1uzrQbMx50FI0RAy1Z5bg_lxyrQaFKH3bedOlJofD9WHhPof8o1rlsd3T8Soljd6gEuHrvYp0J63jQl1_blUa6trKULw_MMbihKQGoVqxtwfMf91n9NeC9TDvZBQZIYvrmv1cOM-xGGgQhkq-_KuY1k4Zu5mGYW_u-Ja28lpBnWUNw";

fn keypair(pem: &str, kid: &str, n: &str) -> TestKeyPair {
    let encoding_key =
        EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Failed to create encoding key");

    TestKeyPair {
        encoding_key,
        kid: kid.to_string(),
        jwk: json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": kid,
            "n": n,
            "e": "AQAB",
        }),
    }
}

/// Key the pool signs with today
pub fn primary_keypair() -> TestKeyPair {
    keypair(PRIMARY_PEM, "k1", PRIMARY_N)
}

/// Key the pool rotates to
pub fn rotated_keypair() -> TestKeyPair {
    keypair(ROTATED_PEM, "k2", ROTATED_N)
}

/// Sign `claims` as RS256 with the given key id
pub fn create_test_jwt<T: Serialize>(claims: &T, key: &EncodingKey, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());

    jsonwebtoken::encode(&header, claims, key).expect("Failed to encode JWT")
}

/// JWKS document body for the given keys
pub fn jwks_body(keys: &[&TestKeyPair]) -> String {
    let keys: Vec<&Value> = keys.iter().map(|keypair| &keypair.jwk).collect();
    json!({ "keys": keys }).to_string()
}

/// Mock server publishing `keys` at [`JWKS_PATH`]
pub async fn setup_jwks_server(keys: &[&TestKeyPair]) -> ServerGuard {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", JWKS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(jwks_body(keys))
        .create_async()
        .await;

    server
}

/// Mock server counting JWKS fetches. The first fetch serves `first`, every
/// later fetch serves `later`.
pub async fn setup_counting_jwks_server(
    counter: Arc<AtomicU32>,
    first: String,
    later: String,
) -> ServerGuard {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", JWKS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            let previous = counter.fetch_add(1, Ordering::SeqCst);
            if previous == 0 {
                first.clone().into()
            } else {
                later.clone().into()
            }
        })
        .create_async()
        .await;

    server
}

pub fn jwks_url(server: &ServerGuard) -> String {
    format!("{}{}", server.url(), JWKS_PATH)
}

/// Claims shaped like a Cognito ID token
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub email: String,
    #[serde(rename = "cognito:username")]
    pub cognito_username: String,
    pub token_use: String,
}

impl TestClaims {
    /// Valid claims that expire in 1 hour
    pub fn valid() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: "7d1f2c9e-0b7a-4a55-9f54-0c4b3c1e2f10".to_string(),
            aud: AUDIENCE.to_string(),
            exp: now + 3600,
            iat: now,
            email: "trader@example.com".to_string(),
            cognito_username: "trader".to_string(),
            token_use: "id".to_string(),
        }
    }

    /// Claims that expired 1 hour ago
    pub fn expired() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            exp: now - 3600,
            iat: now - 7200,
            ..Self::valid()
        }
    }

    /// Claims issued for another app client
    pub fn wrong_audience() -> Self {
        Self {
            aud: "another-client".to_string(),
            ..Self::valid()
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("Failed to serialize claims")
    }
}
