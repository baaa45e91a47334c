//! Service settings read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::UserPool;
use crate::config::VerifierConfig;
use crate::error::Error;
use crate::error::Result;

const DEFAULT_CORS_ORIGINS: &str = r#"["http://localhost:3000"]"#;
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/dashboard";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct Settings {
    pub user_pool: UserPool,
    /// OAuth app client id; also the audience tokens must carry
    pub client_id: String,
    /// Hosted UI domain used for the code exchange
    pub cognito_domain: String,
    pub cors_origins: Vec<String>,
    pub redirect_uri: String,
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwks_cache_ttl: Duration,
    pub jwks_refresh_interval: Option<Duration>,
    pub cookie_secure: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let region = get("AWS_REGION").ok_or(Error::MissingConfig("AWS_REGION"))?;
        let user_pool_id = get("COGNITO_USER_POOL_ID")
            .or_else(|| get("USER_POOL_ID"))
            .ok_or(Error::MissingConfig("COGNITO_USER_POOL_ID"))?;
        let client_id = get("COGNITO_CLIENT_ID")
            .or_else(|| get("OIDC_CLIENT_ID"))
            .ok_or(Error::MissingConfig("COGNITO_CLIENT_ID"))?;
        let cognito_domain = get("COGNITO_DOMAIN").ok_or(Error::MissingConfig("COGNITO_DOMAIN"))?;

        let cors_raw = get("BACKEND_CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());
        let cors_origins: Vec<String> =
            serde_json::from_str(&cors_raw).map_err(|error| Error::InvalidConfig {
                key: "BACKEND_CORS_ORIGINS",
                message: format!("expected a JSON array of origins: {error}"),
            })?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|error| Error::InvalidConfig {
            key: "BIND_ADDR",
            message: format!("{bind_raw:?} is not a socket address: {error}"),
        })?;

        let jwks_cache_ttl = match get("JWKS_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_secs("JWKS_CACHE_TTL_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
        };

        let jwks_refresh_interval = match get("JWKS_REFRESH_INTERVAL_SECS") {
            Some(raw) => match parse_secs("JWKS_REFRESH_INTERVAL_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => false,
        };

        Ok(Self {
            user_pool: UserPool::new(region, user_pool_id),
            client_id,
            cognito_domain,
            cors_origins,
            redirect_uri: get("OAUTH_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            bind_addr,
            database_url: get("DATABASE_URL"),
            jwks_cache_ttl,
            jwks_refresh_interval,
            cookie_secure,
        })
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig::new(&self.user_pool, &self.client_id).with_cache_ttl(self.jwks_cache_ttl)
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| Error::InvalidConfig {
        key,
        message: format!("{raw:?} is not a whole number of seconds"),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig {
            key,
            message: format!("{raw:?} is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("AWS_REGION", "ap-south-1"),
        ("COGNITO_USER_POOL_ID", "ap-south-1_pool"),
        ("COGNITO_CLIENT_ID", "client123"),
        ("COGNITO_DOMAIN", "example.auth.ap-south-1.amazoncognito.com"),
    ];

    #[test]
    fn required_values_with_defaults() {
        let settings = Settings::from_lookup(lookup(REQUIRED)).unwrap();

        assert_eq!(settings.client_id, "client123");
        assert_eq!(settings.cors_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(settings.redirect_uri, "http://localhost:3000/dashboard");
        assert_eq!(settings.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(settings.jwks_cache_ttl, Duration::from_secs(3600));
        assert!(settings.jwks_refresh_interval.is_none());
        assert!(settings.database_url.is_none());
        assert!(!settings.cookie_secure);
        assert_eq!(
            settings.verifier_config().jwks_url(),
            "https://cognito-idp.ap-south-1.amazonaws.com/ap-south-1_pool/.well-known/jwks.json"
        );
    }

    #[test]
    fn each_missing_required_value_is_named() {
        for (missing, _) in REQUIRED {
            let rest: Vec<(&str, &str)> = REQUIRED
                .iter()
                .copied()
                .filter(|(key, _)| key != missing)
                .collect();

            match Settings::from_lookup(lookup(&rest)) {
                Err(Error::MissingConfig(key)) => assert_eq!(key, *missing),
                other => panic!("expected MissingConfig({missing}), got {other:?}"),
            }
        }
    }

    #[test]
    fn legacy_variable_names_are_accepted() {
        let settings = Settings::from_lookup(lookup(&[
            ("AWS_REGION", "ap-south-1"),
            ("USER_POOL_ID", "legacy_pool"),
            ("OIDC_CLIENT_ID", "legacy_client"),
            ("COGNITO_DOMAIN", "example.com"),
        ]))
        .unwrap();

        assert_eq!(settings.user_pool.user_pool_id, "legacy_pool");
        assert_eq!(settings.client_id, "legacy_client");
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("COGNITO_CLIENT_ID", " "));
        vars.remove(2);

        assert!(matches!(
            Settings::from_lookup(lookup(&vars)),
            Err(Error::MissingConfig("COGNITO_CLIENT_ID"))
        ));
    }

    #[test]
    fn optional_values_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend_from_slice(&[
            ("BACKEND_CORS_ORIGINS", r#"["https://app.example.com","http://localhost:3000"]"#),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "sqlite://brokers.db"),
            ("JWKS_CACHE_TTL_SECS", "600"),
            ("JWKS_REFRESH_INTERVAL_SECS", "300"),
            ("COOKIE_SECURE", "true"),
        ]);

        let settings = Settings::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(settings.cors_origins.len(), 2);
        assert_eq!(settings.bind_addr.port(), 9000);
        assert_eq!(settings.database_url.as_deref(), Some("sqlite://brokers.db"));
        assert_eq!(settings.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(settings.jwks_refresh_interval, Some(Duration::from_secs(300)));
        assert!(settings.cookie_secure);
    }

    #[test]
    fn malformed_optional_values_are_rejected() {
        for (key, value) in [
            ("BACKEND_CORS_ORIGINS", "http://localhost:3000"),
            ("BIND_ADDR", "localhost"),
            ("JWKS_CACHE_TTL_SECS", "an hour"),
            ("COOKIE_SECURE", "maybe"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, value));

            match Settings::from_lookup(lookup(&vars)) {
                Err(Error::InvalidConfig { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("expected InvalidConfig({key}), got {other:?}"),
            }
        }
    }
}
