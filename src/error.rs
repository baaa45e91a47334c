use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Token was signed by a key not present in the JWKS: {0}")]
    UnknownSigningKey(String),
    #[error("Token signature is invalid: {0}")]
    SignatureInvalid(String),
    #[error("Token audience does not match the configured client id")]
    AudienceMismatch,
    #[error("The provided JWT has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetchFailed(String),
    #[error("No bearer token supplied")]
    MissingToken,
    #[error("Missing required configuration value: {0}")]
    MissingConfig(&'static str),
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: &'static str, message: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownSigningKey(_) => "unknown_signing_key",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::TokenExpired(_) => "token_expired",
            Self::KeyFetchFailed(_) => "key_fetch_failed",
            Self::MissingToken => "not_authenticated",
            Self::MissingConfig(_) => "missing_config",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::InvalidRequest(_) => "invalid_request",
            Self::TokenExchangeFailed(_) => "token_exchange_failed",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the caller failed to authenticate (as opposed to a bad request or a server fault).
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::UnknownSigningKey(_)
                | Self::SignatureInvalid(_)
                | Self::AudienceMismatch
                | Self::TokenExpired(_)
                | Self::KeyFetchFailed(_)
                | Self::MissingToken
        )
    }
}

pub(crate) fn fetch_jwks_error(error: reqwest::Error) -> Error {
    Error::KeyFetchFailed(format!("request to JWKS endpoint failed: {error}"))
}

pub(crate) fn token_exchange_error(error: reqwest::Error) -> Error {
    Error::TokenExchangeFailed(format!("request to token endpoint failed: {error}"))
}

/// Map a `jsonwebtoken` decode failure onto the verification taxonomy.
///
/// Expiry and audience are checked by the verifier itself, so only structural
/// and signature failures arrive here.
pub(crate) fn jwt_error(error: jsonwebtoken::errors::Error) -> Error {
    match error.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
            Error::SignatureInvalid(error.to_string())
        }
        _ => Error::MalformedToken(error.to_string()),
    }
}
