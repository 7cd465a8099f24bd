//! # idtoolkit
//!
//! Server-side client for a hosted identity toolkit service.
//!
//! The service signs identity tokens for users who signed in through its widget and
//! exposes a relying-party REST API for account management. This crate verifies
//! those tokens locally and relays account calls, authenticating as a service account.
//!
//! ## Features
//!
//! - RS256 token verification against the service's rotating certificates
//! - Certificate caching driven by the `Cache-Control: max-age` of the certificate endpoint
//! - Issuer, audience (project id or client id) and expiry validation
//! - Account lookup by email or id, paginated download, bulk upload with hash parameters, deletion
//! - Out-of-band codes and widget links for password reset, email change and email verification
//! - Service-account JWT bearer authorization with access-token caching
//!
//! ## Example
//!
//! ```rust,no_run
//! use idtoolkit::{ClientConfig, IdentityClient, OobRequest, ServiceAccountKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = ServiceAccountKey::from_json(&std::fs::read_to_string("service-account.json")?)?;
//!     let config = ClientConfig::new("https://example.com/widget", "my-project")?
//!         .with_audience("1234.apps.example.com")
//!         .with_service_account(key);
//!
//!     let client = IdentityClient::new(config)?;
//!
//!     // Verify a token
//!     let user = client.verify_user("eyJhbGciOiJSUzI1NiIsImtpZCI6...").await?;
//!     println!("User: {} <{:?}>", user.user_id, user.email);
//!
//!     // Send a password reset link
//!     let response = client.get_oob_result(&OobRequest::reset_password("user@example.com")).await;
//!     println!("{}", response.response_body());
//!
//!     Ok(())
//! }
//! ```

mod account;
mod certs;
mod claims;
mod client;
mod config;
mod credentials;
mod error;
mod extract;
mod oob;
mod rpc;
mod verifier;

// Re-exports for public API
pub use account::Account;
pub use account::AccountPage;
pub use account::AccountPager;
pub use account::HashAlgorithm;
pub use account::HashOptions;
pub use account::ProviderUserInfo;
pub use account::UploadError;
pub use account::UploadResult;
pub use claims::Audience;
pub use claims::User;
pub use claims::VerifiedToken;
pub use client::IdentityClient;
pub use config::ClientConfig;
pub use config::ServiceAccountKey;
pub use error::Error;
pub use error::Result;
pub use extract::token_from_authorization;
pub use extract::token_from_cookie;
pub use extract::Headers;
pub use oob::build_oob_link;
pub use oob::OobAction;
pub use oob::OobRequest;
pub use oob::OobResponse;
pub use oob::OobResult;
pub use verifier::TokenVerifier;
pub use verifier::VerifyToken;
