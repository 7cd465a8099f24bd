use chrono::Utc;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::warn;

use crate::config::ServiceAccountKey;
use crate::error::token_exchange_error;
use crate::error::Error;
use crate::error::Result;

const SCOPE: &str = "https://www.googleapis.com/auth/identitytoolkit";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Access tokens are renewed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + REFRESH_MARGIN_SECS < self.expires_at
    }
}

/// Mints bearer tokens for outbound calls from a service-account key
pub(crate) struct ServiceAccountCredentials {
    email: String,
    token_uri: String,
    key: EncodingKey,
    client: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountCredentials {
    pub(crate) fn new(account: &ServiceAccountKey, client: Client) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key_pem.as_bytes()).map_err(|err| {
            Error::InvalidConfig(format!(
                "private key of service account {}: {err}",
                account.email
            ))
        })?;

        Ok(Self {
            email: account.email.clone(),
            token_uri: account.token_uri.clone(),
            key,
            client,
            cached: RwLock::new(None),
        })
    }

    /// Current access token, exchanging a fresh assertion when the cached one is near expiry
    pub(crate) async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.access_token.clone());
            }
        }

        let token = self.exchange(now).await?;
        let access_token = token.access_token.clone();
        *self.cached.write().await = Some(token);

        Ok(access_token)
    }

    fn assertion(&self, now: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.email,
            scope: SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }

    async fn exchange(&self, now: i64) -> Result<CachedToken> {
        let assertion = self.assertion(now)?;
        debug!(account = %self.email, "exchanging service account assertion");

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(token_exchange_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(TokenErrorResponse { error, .. }) => error,
                Err(_) => body,
            };
            warn!(account = %self.email, status = status.as_u16(), %message, "token exchange rejected");
            return Err(Error::TokenExchange(format!("{status}: {message}")));
        }

        let token: TokenResponse = response.json().await.map_err(token_exchange_error)?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}
