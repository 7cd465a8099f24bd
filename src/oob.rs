//! Out-of-band confirmation codes and the links that carry them.
//!
//! Password resets, email changes and email verifications are completed by the
//! user following a link to the sign-in widget. The identity service issues the
//! one-time code; this module asks for it and composes the link.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::error::Error;
use crate::error::Result;
use crate::rpc::RpcClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OobAction {
    ResetPassword,
    ChangeEmail,
    VerifyEmail,
}

impl OobAction {
    /// Widget `mode` parameter for this action
    pub fn mode(&self) -> &'static str {
        match self {
            OobAction::ResetPassword => "resetPassword",
            OobAction::ChangeEmail => "changeEmail",
            OobAction::VerifyEmail => "verifyEmail",
        }
    }

    fn request_type(&self) -> &'static str {
        match self {
            OobAction::ResetPassword => "PASSWORD_RESET",
            OobAction::ChangeEmail => "NEW_EMAIL_ACCEPT",
            OobAction::VerifyEmail => "VERIFY_EMAIL",
        }
    }
}

/// A request for an out-of-band code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OobRequest {
    ResetPassword {
        email: String,
        captcha_challenge: Option<String>,
        captcha_response: Option<String>,
        user_ip: Option<String>,
    },
    /// Requires the identity token of the signed-in user
    ChangeEmail {
        old_email: String,
        new_email: String,
        id_token: String,
        user_ip: Option<String>,
    },
    VerifyEmail {
        email: String,
    },
}

impl OobRequest {
    pub fn reset_password(email: impl Into<String>) -> Self {
        OobRequest::ResetPassword {
            email: email.into(),
            captcha_challenge: None,
            captcha_response: None,
            user_ip: None,
        }
    }

    pub fn verify_email(email: impl Into<String>) -> Self {
        OobRequest::VerifyEmail {
            email: email.into(),
        }
    }

    pub fn action(&self) -> OobAction {
        match self {
            OobRequest::ResetPassword { .. } => OobAction::ResetPassword,
            OobRequest::ChangeEmail { .. } => OobAction::ChangeEmail,
            OobRequest::VerifyEmail { .. } => OobAction::VerifyEmail,
        }
    }

    /// Parse the form the sign-in widget posts
    ///
    /// `action` selects the flow: `resetPassword` reads `email`, `challenge` and
    /// `response`; `changeEmail` reads `oldEmail` and `newEmail` and needs the
    /// signed-in user's `id_token`.
    pub fn from_form(
        params: &HashMap<String, String>,
        user_ip: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<Self> {
        let action = param(params, "action")?;
        let user_ip = user_ip.map(str::to_string);

        match action {
            "resetPassword" => Ok(OobRequest::ResetPassword {
                email: param(params, "email")?.to_string(),
                captcha_challenge: params.get("challenge").cloned(),
                captcha_response: params.get("response").cloned(),
                user_ip,
            }),
            "changeEmail" => Ok(OobRequest::ChangeEmail {
                old_email: param(params, "oldEmail")?.to_string(),
                new_email: param(params, "newEmail")?.to_string(),
                id_token: id_token
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidOobRequest("changeEmail requires a signed-in user".into())
                    })?
                    .to_string(),
                user_ip,
            }),
            other => Err(Error::InvalidOobRequest(format!("unknown action {other:?}"))),
        }
    }

    fn to_wire(&self) -> GetOobCodeRequest<'_> {
        let mut wire = GetOobCodeRequest {
            request_type: self.action().request_type(),
            email: None,
            new_email: None,
            id_token: None,
            challenge: None,
            captcha_resp: None,
            user_ip: None,
        };

        match self {
            OobRequest::ResetPassword {
                email,
                captcha_challenge,
                captcha_response,
                user_ip,
            } => {
                wire.email = Some(email.as_str());
                wire.challenge = captcha_challenge.as_deref();
                wire.captcha_resp = captcha_response.as_deref();
                wire.user_ip = user_ip.as_deref();
            }
            OobRequest::ChangeEmail {
                old_email,
                new_email,
                id_token,
                user_ip,
            } => {
                wire.email = Some(old_email.as_str());
                wire.new_email = Some(new_email.as_str());
                wire.id_token = Some(id_token.as_str());
                wire.user_ip = user_ip.as_deref();
            }
            OobRequest::VerifyEmail { email } => {
                wire.email = Some(email.as_str());
            }
        }

        wire
    }

    fn emails(&self) -> (&str, Option<&str>) {
        match self {
            OobRequest::ResetPassword { email, .. } | OobRequest::VerifyEmail { email } => {
                (email.as_str(), None)
            }
            OobRequest::ChangeEmail {
                old_email,
                new_email,
                ..
            } => (old_email.as_str(), Some(new_email.as_str())),
        }
    }
}

fn param<'p>(params: &'p HashMap<String, String>, name: &str) -> Result<&'p str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::InvalidOobRequest(format!("missing parameter {name:?}")))
}

/// A generated code and the link that delivers it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OobResult {
    pub action: OobAction,
    pub email: String,
    pub new_email: Option<String>,
    pub oob_code: String,
    pub oob_link: String,
}

/// Outcome of an out-of-band request, ready to be relayed to the widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OobResponse {
    Success(OobResult),
    Failure { error: String },
}

impl OobResponse {
    pub(crate) fn failure(error: &Error) -> Self {
        let error = match error {
            Error::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };
        OobResponse::Failure { error }
    }

    pub fn result(&self) -> Option<&OobResult> {
        match self {
            OobResponse::Success(result) => Some(result),
            OobResponse::Failure { .. } => None,
        }
    }

    /// JSON body the widget expects in reply
    pub fn response_body(&self) -> String {
        match self {
            OobResponse::Success(_) => json!({ "success": true }).to_string(),
            OobResponse::Failure { error } => json!({ "error": error }).to_string(),
        }
    }
}

/// Append `mode` and `oobCode` to the widget URL, keeping any query it already has
pub fn build_oob_link(widget_url: &Url, action: OobAction, oob_code: &str) -> String {
    let mut link = widget_url.clone();
    link.query_pairs_mut()
        .append_pair("mode", action.mode())
        .append_pair("oobCode", oob_code);
    link.into()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetOobCodeRequest<'a> {
    request_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha_resp: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_ip: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetOobCodeResponse {
    oob_code: Option<String>,
}

impl RpcClient {
    pub(crate) async fn get_oob_code(&self, request: &OobRequest) -> Result<String> {
        let response: GetOobCodeResponse = self
            .call("getOobConfirmationCode", &request.to_wire())
            .await?;

        response
            .oob_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::MalformedResponse("getOobConfirmationCode returned no oobCode".into()))
    }

    pub(crate) async fn get_oob_result(
        &self,
        widget_url: &Url,
        request: &OobRequest,
    ) -> Result<OobResult> {
        let oob_code = self.get_oob_code(request).await?;
        let action = request.action();
        let (email, new_email) = request.emails();

        Ok(OobResult {
            action,
            email: email.to_string(),
            new_email: new_email.map(str::to_string),
            oob_link: build_oob_link(widget_url, action, &oob_code),
            oob_code,
        })
    }
}
