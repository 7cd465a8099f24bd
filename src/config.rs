use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::error::Result;

const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/identitytoolkit/v3/relyingparty/";
const DEFAULT_ISSUER: &str = "https://identitytoolkit.google.com/";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_COOKIE_NAME: &str = "gtoken";
const DEFAULT_CERTS_FALLBACK_TTL_SECS: u64 = 3600;
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
const DEFAULT_CERTS_MIN_REFRESH_INTERVAL_SECS: u64 = 30;

/// Service-account credential used to mint outbound bearer tokens
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "client_email")]
    pub(crate) email: String,
    #[serde(rename = "private_key")]
    pub(crate) private_key_pem: String,
    #[serde(default = "default_token_uri")]
    pub(crate) token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Create a credential from the account email and its RSA private key in PEM format
    pub fn new(email: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            private_key_pem: private_key_pem.into(),
            token_uri: default_token_uri(),
        }
    }

    /// Parse a service-account key file (`client_email`, `private_key`, `token_uri`)
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the OAuth token endpoint the signed assertion is exchanged at
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("email", &self.email)
            .field("private_key_pem", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Configuration for the identity toolkit client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sign-in widget URL that out-of-band links point at
    pub(crate) widget_url: Url,
    /// Accepted audiences - a token's audience must match at least one of these
    pub(crate) audiences: Vec<String>,
    pub(crate) service_account: Option<ServiceAccountKey>,
    pub(crate) server_api_key: Option<String>,
    /// Cookie the identity token is read from
    pub(crate) cookie_name: String,
    pub(crate) issuer: String,
    pub(crate) api_base_url: String,
    /// Defaults to `<api_base_url>publicKeys`
    pub(crate) certs_url: Option<String>,
    /// Used when the certificate response carries no usable `max-age`
    pub(crate) certs_fallback_ttl: Duration,
    /// Minimum time between refreshes caused by an unknown key id
    pub(crate) certs_min_refresh_interval: Duration,
    pub(crate) clock_skew: Duration,
    /// Optional custom HTTP client
    /// If not provided, a default client will be created
    pub(crate) http_client: Option<Client>,
}

impl ClientConfig {
    /// Create a new configuration with the given widget URL and a single accepted audience
    pub fn new(widget_url: &str, audience: impl Into<String>) -> Result<Self> {
        Self::new_with_audiences(widget_url, vec![audience.into()])
    }

    /// Create a new configuration accepting any of the given audiences
    ///
    /// # Errors
    /// Returns `Error::NoAudiencesConfigured` if the audiences vector is empty and
    /// `Error::InvalidConfig` if the widget URL is not an absolute URL
    pub fn new_with_audiences(widget_url: &str, audiences: Vec<String>) -> Result<Self> {
        if audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        Ok(Self {
            widget_url: parse_widget_url(widget_url)?,
            audiences,
            service_account: None,
            server_api_key: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            certs_url: None,
            certs_fallback_ttl: Duration::from_secs(DEFAULT_CERTS_FALLBACK_TTL_SECS),
            certs_min_refresh_interval: Duration::from_secs(
                DEFAULT_CERTS_MIN_REFRESH_INTERVAL_SECS,
            ),
            clock_skew: Duration::from_secs(DEFAULT_CLOCK_SKEW_SECS),
            http_client: None,
        })
    }

    /// Load configuration from a JSON file
    ///
    /// A relative `serviceAccountPrivateKeyFile` is resolved against the directory of
    /// the configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&raw)?;
        file.into_config(path.parent())
    }

    /// Load configuration from a JSON document
    ///
    /// A `serviceAccountPrivateKeyFile` entry is resolved against the working directory.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)?;
        file.into_config(None)
    }

    /// Add a single accepted audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    pub fn with_service_account(mut self, key: ServiceAccountKey) -> Self {
        self.service_account = Some(key);
        self
    }

    pub fn with_server_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.server_api_key = Some(api_key.into());
        self
    }

    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    /// Set the expected `iss` claim of verified tokens
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the base URL of the relying-party API. A trailing slash is added if missing.
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.api_base_url = base_url;
        self
    }

    pub fn with_certs_url(mut self, certs_url: impl Into<String>) -> Self {
        self.certs_url = Some(certs_url.into());
        self
    }

    pub fn with_certs_fallback_ttl(mut self, ttl: Duration) -> Self {
        self.certs_fallback_ttl = ttl;
        self
    }

    /// Limit how often tokens with an unknown key id may trigger a certificate refresh
    pub fn with_certs_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.certs_min_refresh_interval = interval;
        self
    }

    /// Set the leeway applied to `exp` and `iat` checks
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn widget_url(&self) -> &Url {
        &self.widget_url
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub(crate) fn certs_url(&self) -> String {
        self.certs_url
            .clone()
            .unwrap_or_else(|| format!("{}publicKeys", self.api_base_url))
    }
}

fn parse_widget_url(widget_url: &str) -> Result<Url> {
    Url::parse(widget_url)
        .map_err(|err| Error::InvalidConfig(format!("widget URL {widget_url:?}: {err}")))
}

/// On-disk configuration format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    client_id: Option<String>,
    project_id: Option<String>,
    service_account_email: Option<String>,
    service_account_private_key_file: Option<String>,
    service_account_private_key: Option<String>,
    widget_url: String,
    cookie_name: Option<String>,
    server_api_key: Option<String>,
}

impl ConfigFile {
    fn into_config(self, base_dir: Option<&Path>) -> Result<ClientConfig> {
        let audiences = [self.project_id, self.client_id]
            .into_iter()
            .flatten()
            .filter(|aud| !aud.is_empty())
            .collect();

        let mut config = ClientConfig::new_with_audiences(&self.widget_url, audiences)?;

        if let Some(cookie_name) = self.cookie_name {
            config = config.with_cookie_name(cookie_name);
        }

        if let Some(api_key) = self.server_api_key {
            config = config.with_server_api_key(api_key);
        }

        let private_key = match (
            self.service_account_private_key,
            self.service_account_private_key_file,
        ) {
            (Some(pem), _) => Some(pem),
            (None, Some(file)) => {
                let key_path = match base_dir {
                    Some(dir) => dir.join(file),
                    None => Path::new(&file).to_path_buf(),
                };
                Some(std::fs::read_to_string(key_path)?)
            }
            (None, None) => None,
        };

        match (self.service_account_email, private_key) {
            (Some(email), Some(pem)) => {
                config = config.with_service_account(ServiceAccountKey::new(email, pem));
            }
            (None, None) => {}
            _ => {
                return Err(Error::InvalidConfig(
                    "serviceAccountEmail and a service account private key must be set together"
                        .into(),
                ))
            }
        }

        Ok(config)
    }
}
