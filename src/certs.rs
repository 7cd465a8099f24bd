use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;
use x509_parser::pem::parse_x509_pem;

use crate::error::fetch_certs_error;
use crate::error::invalid_certificate;
use crate::error::Error;
use crate::error::Result;

/// Key id to PEM-encoded certificate or public key
pub(crate) type CertMap = HashMap<String, String>;

struct CachedCerts {
    certs: Arc<CertMap>,
    fetched_at: Instant,
    expires_at: Instant,
}

impl CachedCerts {
    fn new(certs: CertMap, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            certs: Arc::new(certs),
            fetched_at: now,
            expires_at: now.checked_add(ttl).unwrap_or(now),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn fetched_within(&self, interval: Duration) -> bool {
        self.fetched_at.elapsed() < interval
    }
}

/// Why a refresh was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    /// Nothing cached yet, or the cached entry outlived its `max-age`
    Expired,
    /// A token names a key id the cached certificates don't have
    UnknownKey,
}

/// Cache for the identity service's signing certificates
///
/// Entries live as long as the `Cache-Control: max-age` of the response that
/// delivered them and are refreshed lazily on the next lookup after that.
/// Refreshes run under the write lock, so concurrent callers on a stale cache
/// share a single fetch.
pub(crate) struct CertificateCache {
    cache: Arc<RwLock<Option<CachedCerts>>>,
    client: Client,
    url: String,
    api_key: Option<String>,
    fallback_ttl: Duration,
    min_refresh_interval: Duration,
}

impl CertificateCache {
    pub(crate) fn new(
        client: Client,
        url: String,
        api_key: Option<String>,
        fallback_ttl: Duration,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            cache: Arc::new(RwLock::new(None)),
            client,
            url,
            api_key,
            fallback_ttl,
            min_refresh_interval,
        }
    }

    /// Get the verification key for `kid`
    ///
    /// An unknown key id on a still-fresh cache triggers a refresh, so rotated
    /// keys are picked up before their predecessors expire. Such refreshes happen
    /// at most once per `min_refresh_interval`.
    pub(crate) async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        let (certs, refreshed) = match self.try_get_cached().await {
            Some(certs) => (certs, false),
            None => (self.refresh(Refresh::Expired).await?, true),
        };

        if let Some(pem) = certs.get(kid) {
            return decoding_key_from_pem(kid, pem);
        }

        if refreshed {
            return Err(Error::KeyNotFound(kid.to_string()));
        }

        debug!(kid, "key id not in cached certificates, refreshing");
        let certs = self.refresh(Refresh::UnknownKey).await?;
        let pem = certs
            .get(kid)
            .ok_or_else(|| Error::KeyNotFound(kid.to_string()))?;

        decoding_key_from_pem(kid, pem)
    }

    /// Try to get certificates from cache if present and not expired
    async fn try_get_cached(&self) -> Option<Arc<CertMap>> {
        let cache = self.cache.read().await;
        let cached = cache.as_ref()?;

        if cached.is_expired() {
            return None;
        }

        Some(Arc::clone(&cached.certs))
    }

    /// Refresh the certificates unless the cache already satisfies `reason`
    ///
    /// The write lock is held across the fetch; callers queued behind it see
    /// the new entry and return without fetching again.
    async fn refresh(&self, reason: Refresh) -> Result<Arc<CertMap>> {
        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.as_ref() {
            let current = match reason {
                Refresh::Expired => !cached.is_expired(),
                Refresh::UnknownKey => cached.fetched_within(self.min_refresh_interval),
            };

            if current {
                return Ok(Arc::clone(&cached.certs));
            }
        }

        let (certs, ttl) = self.fetch_certs().await?;
        debug!(
            keys = certs.len(),
            ttl_secs = ttl.as_secs(),
            ?reason,
            "fetched signing certificates"
        );

        let cached = CachedCerts::new(certs, ttl);
        let certs = Arc::clone(&cached.certs);
        *cache = Some(cached);

        Ok(certs)
    }

    async fn fetch_certs(&self) -> Result<(CertMap, Duration)> {
        let mut request = self.client.get(&self.url);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("key", api_key)]);
        }

        let response = request
            .send()
            .await
            .map_err(fetch_certs_error)?
            .error_for_status()
            .map_err(fetch_certs_error)?;

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(max_age)
            .unwrap_or(self.fallback_ttl);

        let certs: CertMap = response.json().await.map_err(fetch_certs_error)?;

        Ok((certs, ttl))
    }
}

/// Read the cache lifetime out of a `Cache-Control` header value
///
/// `no-cache` and `no-store` win over any `max-age`.
pub(crate) fn max_age(cache_control: &str) -> Option<Duration> {
    let mut max_age = None;

    for directive in cache_control.split(',').map(str::trim) {
        if directive.eq_ignore_ascii_case("no-cache") || directive.eq_ignore_ascii_case("no-store")
        {
            return Some(Duration::ZERO);
        }

        if let Some((name, value)) = directive.split_once('=') {
            if name.trim().eq_ignore_ascii_case("max-age") {
                max_age = value
                    .trim()
                    .trim_matches('"')
                    .parse::<u64>()
                    .ok()
                    .map(Duration::from_secs);
            }
        }
    }

    max_age
}

/// Turn a PEM certificate or RSA public key into a verification key
pub(crate) fn decoding_key_from_pem(kid: &str, pem: &str) -> Result<DecodingKey> {
    if pem.contains("-----BEGIN CERTIFICATE-----") {
        let (_, pem) = parse_x509_pem(pem.as_bytes()).map_err(|err| invalid_certificate(kid, err))?;
        let cert = pem
            .parse_x509()
            .map_err(|err| invalid_certificate(kid, err))?;

        return Ok(DecodingKey::from_rsa_der(
            &cert.public_key().subject_public_key.data,
        ));
    }

    DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| invalid_certificate(kid, err))
}
