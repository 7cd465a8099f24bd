//! Token extraction from incoming requests.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Framework-agnostic access to request headers.
///
/// ```rust,ignore
/// impl idtoolkit::Headers for axum::http::HeaderMap {
///     fn authorization(&self) -> Option<&str> {
///         self.get("authorization").and_then(|v| v.to_str().ok())
///     }
///
///     fn cookie(&self) -> Option<&str> {
///         self.get("cookie").and_then(|v| v.to_str().ok())
///     }
/// }
/// ```
pub trait Headers {
    /// The `Authorization` header value.
    fn authorization(&self) -> Option<&str>;

    /// The `Cookie` header value.
    fn cookie(&self) -> Option<&str>;
}

/// Extract a token from an `Authorization: Bearer` header value.
///
/// The scheme is matched case-insensitively.
pub fn token_from_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.trim()).filter(|token| !token.is_empty())
}

/// Extract the value of `cookie_name` from a `Cookie` header value, percent-decoded.
pub fn token_from_cookie(cookie_header: &str, cookie_name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(|value| match percent_decode_str(value).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => value.to_string(),
        })
}

/// Bearer header first, then the named cookie.
pub(crate) fn token_from_headers<'h, H: Headers>(
    headers: &'h H,
    cookie_name: &str,
) -> Option<Cow<'h, str>> {
    if let Some(token) = headers.authorization().and_then(token_from_authorization) {
        return Some(Cow::Borrowed(token));
    }

    headers
        .cookie()
        .and_then(|cookie| token_from_cookie(cookie, cookie_name))
        .map(Cow::Owned)
}
