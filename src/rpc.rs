use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::credentials::ServiceAccountCredentials;
use crate::error::Error;
use crate::error::Result;

/// Error envelope of the relying-party API
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Thin JSON-over-HTTP client for the relying-party API
pub(crate) struct RpcClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    credentials: Option<ServiceAccountCredentials>,
}

impl RpcClient {
    pub(crate) fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        credentials: Option<ServiceAccountCredentials>,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            credentials,
        }
    }

    /// POST `body` to `<base_url><method>` and decode the JSON answer
    pub(crate) async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        if self.credentials.is_none() && self.api_key.is_none() {
            return Err(Error::MissingCredentials);
        }

        let url = format!("{}{method}", self.base_url);
        let mut request = self.client.post(&url).json(body);

        if let Some(api_key) = &self.api_key {
            request = request.query(&[("key", api_key)]);
        }

        if let Some(credentials) = &self.credentials {
            request = request.bearer_auth(credentials.access_token().await?);
        }

        debug!(method, "calling identity service");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = upstream_message(&body);
            warn!(method, status = status.as_u16(), %message, "identity service call failed");
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// The `error.message` of an API error body, or the raw body if it has another shape
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
