use serde::Deserialize;
use serde::Serialize;

/// The `aud` claim, which the service issues either as a string or as an array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Audience::One(aud) => std::slice::from_ref(aud),
            Audience::Many(auds) => auds,
        }
    }

    /// Whether any audience in the claim is among the accepted ones
    pub fn matches_any(&self, accepted: &[String]) -> bool {
        self.as_slice().iter().any(|aud| accepted.contains(aud))
    }
}

/// Claim set of a verified identity token
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifiedToken {
    pub iss: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
    /// Account id of the signed-in user
    #[serde(default)]
    pub sub: Option<String>,
    /// Older tokens carry the account id here instead of in `sub`
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Identity provider the user signed in with, e.g. `password` or `google.com`
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl VerifiedToken {
    pub fn subject(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .or(self.user_id.as_deref())
            .filter(|sub| !sub.is_empty())
    }

    pub fn user(&self) -> User {
        User {
            user_id: self.subject().unwrap_or_default().to_string(),
            email: self.email.clone(),
            email_verified: self.email_verified.or(self.verified).unwrap_or(false),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider_id: self.provider_id.clone(),
        }
    }
}

/// Signed-in user as described by a verified token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider_id: Option<String>,
}
