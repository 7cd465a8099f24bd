use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Algorithm;
use jsonwebtoken::Validation;
use reqwest::Client;
use tracing::debug;

use crate::certs::CertificateCache;
use crate::claims::VerifiedToken;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::error::Result;

/// Trait for identity token verification
#[async_trait]
pub trait VerifyToken {
    /// Verify a token and return its claim set
    async fn verify(&self, token: &str) -> Result<VerifiedToken>;
}

/// Verifies tokens signed by the identity service against its published certificates
pub struct TokenVerifier {
    certs: CertificateCache,
    issuer: String,
    audiences: Vec<String>,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Create a new token verifier with the given configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = config.http_client.clone().unwrap_or_default();
        Self::with_client(config, client)
    }

    pub(crate) fn with_client(config: &ClientConfig, client: Client) -> Result<Self> {
        if config.audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        Ok(Self {
            certs: CertificateCache::new(
                client,
                config.certs_url(),
                config.server_api_key.clone(),
                config.certs_fallback_ttl,
                config.certs_min_refresh_interval,
            ),
            issuer: config.issuer.clone(),
            audiences: config.audiences.clone(),
            clock_skew: config.clock_skew,
        })
    }

    /// Check issuer, audience and validity window of signature-checked claims
    fn validate_claims(&self, claims: VerifiedToken, now: i64) -> Result<VerifiedToken> {
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);

        if claims.iss != self.issuer {
            return Err(Error::WrongIssuer(claims.iss));
        }

        if !claims.aud.matches_any(&self.audiences) {
            return Err(Error::WrongAudience(claims.aud.as_slice().to_vec()));
        }

        if claims.exp.saturating_add(skew) <= now {
            return Err(Error::TokenExpired(claims.exp));
        }

        if claims.iat.saturating_sub(skew) > now {
            return Err(Error::TokenNotYetValid(claims.iat));
        }

        if claims.subject().is_none() {
            return Err(Error::SubjectMissing);
        }

        Ok(claims)
    }
}

#[async_trait]
impl VerifyToken for TokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let header = decode_header(token)?;

        if header.alg != Algorithm::RS256 {
            return Err(Error::AlgorithmNotSupported(format!("{:?}", header.alg)));
        }

        let kid = header.kid.ok_or(Error::KeyIdMissing)?;
        let decoding_key = self.certs.decoding_key(&kid).await?;

        // Issuer, audience and time checks are done by validate_claims for precise errors
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let token_data = decode::<VerifiedToken>(token, &decoding_key, &validation)?;
        let claims = self.validate_claims(token_data.claims, Utc::now().timestamp())?;

        debug!(kid = %kid, sub = ?claims.subject(), "verified identity token");
        Ok(claims)
    }
}
