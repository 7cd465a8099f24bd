use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use crate::account::Account;
use crate::account::AccountPage;
use crate::account::AccountPager;
use crate::account::HashOptions;
use crate::account::UploadResult;
use crate::claims::User;
use crate::claims::VerifiedToken;
use crate::config::ClientConfig;
use crate::credentials::ServiceAccountCredentials;
use crate::error::Error;
use crate::error::Result;
use crate::extract::token_from_headers;
use crate::extract::Headers;
use crate::oob::OobRequest;
use crate::oob::OobResponse;
use crate::rpc::RpcClient;
use crate::verifier::TokenVerifier;
use crate::verifier::VerifyToken;

/// Server-side client of the identity service
///
/// Verifies identity tokens locally and relays account management calls to the
/// relying-party API. Share one instance (for example behind an `Arc`) so the
/// certificate and access-token caches are reused.
pub struct IdentityClient {
    config: ClientConfig,
    verifier: TokenVerifier,
    rpc: RpcClient,
}

impl IdentityClient {
    /// Create a new client from the given configuration
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the service-account private key cannot be parsed
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = config.http_client.clone().unwrap_or_default();

        let credentials = config
            .service_account
            .as_ref()
            .map(|account| ServiceAccountCredentials::new(account, client.clone()))
            .transpose()?;

        let verifier = TokenVerifier::with_client(&config, client.clone())?;
        let rpc = RpcClient::new(
            client,
            config.api_base_url.clone(),
            config.server_api_key.clone(),
            credentials,
        );

        Ok(Self {
            config,
            verifier,
            rpc,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Verify an identity token and return its claims
    pub async fn verify_token(&self, token: &str) -> Result<VerifiedToken> {
        self.verifier.verify(token).await
    }

    /// Verify an identity token and return the user it describes
    pub async fn verify_user(&self, token: &str) -> Result<User> {
        Ok(self.verify_token(token).await?.user())
    }

    /// Find the identity token of a request: bearer header first, then the configured cookie
    pub fn token_from_request<H: Headers>(&self, headers: &H) -> Option<String> {
        token_from_headers(headers, &self.config.cookie_name).map(|token| token.into_owned())
    }

    /// Extract and verify the identity token of a request
    pub async fn verify_request<H: Headers>(&self, headers: &H) -> Result<User> {
        let token = self.token_from_request(headers).ok_or(Error::TokenMissing)?;
        self.verify_user(&token).await
    }

    /// Look up an account by email; `None` if the service knows no such account
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.rpc.get_account_by_email(email).await
    }

    /// Look up an account by its local id
    pub async fn get_user_by_id(&self, local_id: &str) -> Result<Option<Account>> {
        self.rpc.get_account_by_id(local_id).await
    }

    /// Download one page of accounts, starting at `page_token` or at the beginning
    pub async fn download_accounts(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<AccountPage> {
        self.rpc.download_accounts(max_results, page_token).await
    }

    /// Iterate over all accounts, `page_size` at a time
    pub fn all_accounts(&self, page_size: u32) -> AccountPager<'_> {
        AccountPager::new(&self.rpc, page_size)
    }

    /// Upload accounts whose password hashes were produced as described by `options`
    pub async fn upload_accounts(
        &self,
        options: &HashOptions,
        accounts: &[Account],
    ) -> Result<UploadResult> {
        if accounts.is_empty() {
            return Ok(UploadResult::default());
        }
        self.rpc.upload_accounts(options, accounts).await
    }

    pub async fn delete_account(&self, local_id: &str) -> Result<()> {
        self.rpc.delete_account(local_id).await
    }

    /// Request an out-of-band code and compose its link
    ///
    /// Never fails: errors become an `OobResponse::Failure` whose body can be
    /// relayed to the widget as is.
    pub async fn get_oob_result(&self, request: &OobRequest) -> OobResponse {
        match self
            .rpc
            .get_oob_result(&self.config.widget_url, request)
            .await
        {
            Ok(result) => OobResponse::Success(result),
            Err(err) => {
                warn!(action = request.action().mode(), error = %err, "out-of-band request failed");
                OobResponse::failure(&err)
            }
        }
    }

    /// Handle a form posted by the widget, see [`OobRequest::from_form`]
    pub async fn get_oob_result_from_form(
        &self,
        params: &HashMap<String, String>,
        user_ip: Option<&str>,
        id_token: Option<&str>,
    ) -> OobResponse {
        match OobRequest::from_form(params, user_ip, id_token) {
            Ok(request) => self.get_oob_result(&request).await,
            Err(err) => OobResponse::failure(&err),
        }
    }

    /// Link that confirms ownership of `email` when followed
    pub async fn get_email_verification_link(&self, email: &str) -> Result<String> {
        let request = OobRequest::verify_email(email);
        let result = self
            .rpc
            .get_oob_result(&self.config.widget_url, &request)
            .await?;

        Ok(result.oob_link)
    }
}

#[async_trait]
impl VerifyToken for IdentityClient {
    async fn verify(&self, token: &str) -> Result<VerifiedToken> {
        self.verify_token(token).await
    }
}
