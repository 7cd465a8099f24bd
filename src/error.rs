use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("The provided token does not match the expected issuer. Provided issuer: {0}")]
    WrongIssuer(String),
    #[error("The provided token does not match any configured audience. Provided audience: {0:?}")]
    WrongAudience(Vec<String>),
    #[error("The provided token has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("The provided token was issued in the future. Issued at: {0}")]
    TokenNotYetValid(i64),
    #[error("The provided token carries no subject")]
    SubjectMissing,
    #[error("No identity token found in the request")]
    TokenMissing,
    #[error("Missing 'kid' in the header of the provided token")]
    KeyIdMissing,
    #[error("No certificate found for key id {0}")]
    KeyNotFound(String),
    #[error("Only RS256 signed tokens are supported, got: {0}")]
    AlgorithmNotSupported(String),
    #[error("Certificate for key id {kid} could not be parsed: {reason}")]
    InvalidCertificate { kid: String, reason: String },
    #[error("Certificate cache error: {0}")]
    CertCacheError(String),
    #[error(
        "No audiences configured - at least one expected audience must be configured for security"
    )]
    NoAudiencesConfigured,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No service account or server API key configured for this call")]
    MissingCredentials,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Identity service returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Unexpected response from identity service: {0}")]
    MalformedResponse(String),
    #[error("Invalid out-of-band request: {0}")]
    InvalidOobRequest(String),
}

pub(crate) fn fetch_certs_error(error: reqwest::Error) -> Error {
    Error::CertCacheError(format!("Failed to fetch certificates: {error}"))
}

pub(crate) fn token_exchange_error(error: reqwest::Error) -> Error {
    Error::TokenExchange(format!("Failed to reach token endpoint: {error}"))
}

pub(crate) fn invalid_certificate(kid: &str, reason: impl ToString) -> Error {
    Error::InvalidCertificate {
        kid: kid.to_string(),
        reason: reason.to_string(),
    }
}
