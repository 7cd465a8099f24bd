//! Account records and the account-management calls of the relying-party API.

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::rpc::RpcClient;

/// A user account as stored by the identity service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub local_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Raw password hash bytes, base64url on the wire
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64url")]
    pub password_hash: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64url")]
    pub salt: Option<Vec<u8>>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_user_info: Vec<ProviderUserInfo>,
}

impl Account {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
        self.email = Some(email.into());
        self.email_verified = verified;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    /// Attach an already computed password hash and its salt
    pub fn with_password_hash(mut self, hash: impl Into<Vec<u8>>, salt: impl Into<Vec<u8>>) -> Self {
        self.password_hash = Some(hash.into());
        self.salt = Some(salt.into());
        self
    }
}

/// A federated identity linked to an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUserInfo {
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Password hash algorithms the service accepts on upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashAlgorithm {
    HmacSha256,
    HmacSha1,
    HmacMd5,
    Sha256,
    Sha1,
    Md5,
    Pbkdf2Sha256,
    Pbkdf2Sha1,
    Scrypt,
    Bcrypt,
}

/// How the uploaded password hashes were produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOptions {
    pub algorithm: HashAlgorithm,
    /// Key of the HMAC or scrypt signer
    pub signer_key: Option<Vec<u8>>,
    pub salt_separator: Option<Vec<u8>>,
    pub rounds: Option<u32>,
    pub memory_cost: Option<u32>,
}

impl HashOptions {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            signer_key: None,
            salt_separator: None,
            rounds: None,
            memory_cost: None,
        }
    }

    pub fn with_signer_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signer_key = Some(key.into());
        self
    }

    pub fn with_salt_separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.salt_separator = Some(separator.into());
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }

    pub fn with_memory_cost(mut self, memory_cost: u32) -> Self {
        self.memory_cost = Some(memory_cost);
        self
    }
}

/// One page of a bulk download
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPage {
    #[serde(default)]
    pub users: Vec<Account>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Outcome of a bulk upload; accounts not listed in `errors` were stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResult {
    #[serde(default, rename = "error")]
    pub errors: Vec<UploadError>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadError {
    /// Position of the rejected account in the uploaded list
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetAccountInfoRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_id: Option<[&'a str; 1]>,
}

#[derive(Debug, Deserialize)]
struct GetAccountInfoResponse {
    #[serde(default)]
    users: Vec<Account>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadAccountRequest<'a> {
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadAccountRequest<'a> {
    hash_algorithm: HashAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none", with = "base64url")]
    signer_key: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none", with = "base64url")]
    salt_separator: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_cost: Option<u32>,
    users: &'a [Account],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAccountRequest<'a> {
    local_id: &'a str,
}

impl RpcClient {
    pub(crate) async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let request = GetAccountInfoRequest {
            email: Some([email]),
            local_id: None,
        };
        self.get_account_info(&request).await
    }

    pub(crate) async fn get_account_by_id(&self, local_id: &str) -> Result<Option<Account>> {
        let request = GetAccountInfoRequest {
            email: None,
            local_id: Some([local_id]),
        };
        self.get_account_info(&request).await
    }

    async fn get_account_info(&self, request: &GetAccountInfoRequest<'_>) -> Result<Option<Account>> {
        let response: GetAccountInfoResponse = self.call("getAccountInfo", request).await?;
        Ok(response.users.into_iter().next())
    }

    pub(crate) async fn download_accounts(
        &self,
        max_results: u32,
        next_page_token: Option<&str>,
    ) -> Result<AccountPage> {
        let request = DownloadAccountRequest {
            max_results,
            next_page_token,
        };
        self.call("downloadAccount", &request).await
    }

    pub(crate) async fn upload_accounts(
        &self,
        options: &HashOptions,
        accounts: &[Account],
    ) -> Result<UploadResult> {
        let request = UploadAccountRequest {
            hash_algorithm: options.algorithm,
            signer_key: options.signer_key.clone(),
            salt_separator: options.salt_separator.clone(),
            rounds: options.rounds,
            memory_cost: options.memory_cost,
            users: accounts,
        };
        self.call("uploadAccount", &request).await
    }

    pub(crate) async fn delete_account(&self, local_id: &str) -> Result<()> {
        let _: IgnoredAny = self
            .call("deleteAccount", &DeleteAccountRequest { local_id })
            .await?;
        Ok(())
    }
}

/// Iterates over every account of the project, one download page at a time
pub struct AccountPager<'c> {
    rpc: &'c RpcClient,
    page_size: u32,
    next_page_token: Option<String>,
    done: bool,
}

impl<'c> AccountPager<'c> {
    pub(crate) fn new(rpc: &'c RpcClient, page_size: u32) -> Self {
        Self {
            rpc,
            page_size,
            next_page_token: None,
            done: false,
        }
    }

    /// The next non-empty page, or `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<Account>>> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .rpc
            .download_accounts(self.page_size, self.next_page_token.as_deref())
            .await?;

        self.next_page_token = page.next_page_token.filter(|token| !token.is_empty());
        if self.next_page_token.is_none() || page.users.is_empty() {
            self.done = true;
        }

        if page.users.is_empty() {
            return Ok(None);
        }

        Ok(Some(page.users))
    }

    /// Drain all remaining pages into one list
    pub async fn collect_all(mut self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        while let Some(page) = self.next_page().await? {
            accounts.extend(page);
        }
        Ok(accounts)
    }
}

/// Serde adapter for optional byte fields carried as base64url strings
mod base64url {
    use base64::alphabet;
    use base64::engine::general_purpose::GeneralPurpose;
    use base64::engine::general_purpose::GeneralPurposeConfig;
    use base64::engine::DecodePaddingMode;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new()
            .with_encode_padding(false)
            .with_decode_padding_mode(DecodePaddingMode::Indifferent),
    );

    pub(super) fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_str(&URL_SAFE_LENIENT.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        // Older responses use the standard alphabet
        let normalized = encoded.replace('+', "-").replace('/', "_");
        URL_SAFE_LENIENT
            .decode(normalized)
            .map(Some)
            .map_err(D::Error::custom)
    }
}
