use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Decoded payload of a verified token
///
/// Holds every claim the issuer put into the token, standard or not. Accessors
/// cover the claims this service reads; everything else is reachable via [`TokenClaims::get`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Subject (sub) claim
    pub fn sub(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// Expiration time (exp) claim as a Unix timestamp
    pub fn exp(&self) -> Option<i64> {
        let exp = self.0.get("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
    }

    /// Audience (aud) claim, which may be a single string or an array
    pub fn aud(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud().contains(&audience)
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// Username as Cognito reports it: `cognito:username` on ID tokens, `username` on access tokens
    pub fn username(&self) -> Option<&str> {
        self.str_claim("cognito:username")
            .or_else(|| self.str_claim("username"))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for TokenClaims {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}
