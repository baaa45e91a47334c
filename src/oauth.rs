//! Authorization-code exchange against the Cognito hosted UI token endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::token_exchange_error;
use crate::error::Error;
use crate::error::Result;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Tokens returned by a successful exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Client for the OAuth2 token endpoint of one app client
#[derive(Debug, Clone)]
pub struct OAuthClient {
    token_url: String,
    client_id: String,
    redirect_uri: String,
    http: Client,
}

impl OAuthClient {
    /// `domain` is the hosted UI domain, with or without a scheme
    pub fn new(
        domain: &str,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(token_exchange_error)?;

        Ok(Self {
            token_url: token_url(domain),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            http,
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        if code.is_empty() {
            return Err(Error::InvalidRequest("authorization code is empty".to_string()));
        }

        debug!(url = %self.token_url, "exchanging authorization code");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(token_exchange_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchangeFailed(format!(
                "token endpoint returned HTTP {status}: {body}"
            )));
        }

        response.json().await.map_err(token_exchange_error)
    }
}

fn token_url(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("https://") || domain.starts_with("http://") {
        format!("{domain}/oauth2/token")
    } else {
        format!("https://{domain}/oauth2/token")
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    #[test]
    fn token_url_adds_scheme_when_missing() {
        assert_eq!(
            token_url("example.auth.ap-south-1.amazoncognito.com"),
            "https://example.auth.ap-south-1.amazoncognito.com/oauth2/token"
        );
        assert_eq!(
            token_url("http://localhost:9000/"),
            "http://localhost:9000/oauth2/token"
        );
    }

    #[tokio::test]
    async fn exchanges_code_with_form_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "client123".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "http://localhost:3000/dashboard".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id_token":"id","access_token":"access","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let client =
            OAuthClient::new(&server.url(), "client123", "http://localhost:3000/dashboard").unwrap();
        let tokens = client.exchange_code("the-code").await.unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.id_token, "id");
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.expires_in, Some(3600));
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn rejected_code_is_an_exchange_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(&server.url(), "client123", "http://localhost/cb").unwrap();
        let error = client.exchange_code("stale").await.unwrap_err();

        assert!(matches!(error, Error::TokenExchangeFailed(_)));
    }

    #[tokio::test]
    async fn empty_code_is_rejected_without_a_request() {
        let client = OAuthClient::new("localhost:1", "client123", "http://localhost/cb").unwrap();
        let error = client.exchange_code("").await.unwrap_err();

        assert!(matches!(error, Error::InvalidRequest(_)));
    }
}
