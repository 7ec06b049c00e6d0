//! services/web/src/web/session.rs
//!
//! Cookie handling for the browser session and for notices that survive a redirect.
//!
//! The session cookie carries the auth session id and an HMAC-SHA256 tag over it,
//! keyed by the configured secret: `session=<uuid>.<hex tag>`. The database remains
//! the authority on whether the session is still valid.

use crate::error::ApiError;
use axum::http::{header, HeaderMap};
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const NOTICE_COOKIE: &str = "flash";

/// How long a login lasts, both in the database and in the browser.
pub fn session_lifetime() -> Duration {
    Duration::days(30)
}

//=========================================================================================
// Cookie Parsing
//=========================================================================================

/// Returns the value of the named cookie from the request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// The auth session id from a correctly signed session cookie.
pub fn session_id_from_headers(headers: &HeaderMap, secret: &str) -> Option<String> {
    read_cookie(headers, SESSION_COOKIE).and_then(|value| verify_session_value(secret, value))
}

//=========================================================================================
// Signing
//=========================================================================================

fn mac_for(secret: &str) -> Result<HmacSha256, ApiError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid session signing key: {}", e)))
}

/// Produces the cookie value `<id>.<hex tag>` for an auth session id.
pub fn sign_session_id(secret: &str, session_id: &str) -> Result<String, ApiError> {
    let mut mac = mac_for(secret)?;
    mac.update(session_id.as_bytes());
    let tag = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", session_id, tag))
}

/// Checks the tag on a cookie value and returns the session id it protects.
pub fn verify_session_value(secret: &str, value: &str) -> Option<String> {
    let (session_id, tag) = value.rsplit_once('.')?;
    let tag = hex::decode(tag).ok()?;
    let mut mac = mac_for(secret).ok()?;
    mac.update(session_id.as_bytes());
    mac.verify_slice(&tag).ok()?;
    Some(session_id.to_string())
}

//=========================================================================================
// Set-Cookie Values
//=========================================================================================

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn session_cookie(signed_value: &str, secure: bool) -> String {
    cookie(
        SESSION_COOKIE,
        signed_value,
        session_lifetime().num_seconds(),
        secure,
    )
}

pub fn clear_session_cookie(secure: bool) -> String {
    cookie(SESSION_COOKIE, "", 0, secure)
}

pub fn notice_cookie(notice: Notice, secure: bool) -> String {
    cookie(NOTICE_COOKIE, notice.key(), 60, secure)
}

pub fn clear_notice_cookie(secure: bool) -> String {
    cookie(NOTICE_COOKIE, "", 0, secure)
}

//=========================================================================================
// Notices
//=========================================================================================

/// A message shown on the page a redirect lands on.
///
/// Only the key travels in the cookie, so the text cannot be forged by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Registered,
    LoggedOut,
    NewChatFailed,
    ChatNotFound,
}

impl Notice {
    pub fn key(&self) -> &'static str {
        match self {
            Notice::Registered => "registered",
            Notice::LoggedOut => "logged_out",
            Notice::NewChatFailed => "new_chat_failed",
            Notice::ChatNotFound => "chat_not_found",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "registered" => Some(Notice::Registered),
            "logged_out" => Some(Notice::LoggedOut),
            "new_chat_failed" => Some(Notice::NewChatFailed),
            "chat_not_found" => Some(Notice::ChatNotFound),
            _ => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Notice::Registered | Notice::LoggedOut => "success",
            Notice::NewChatFailed | Notice::ChatNotFound => "danger",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Notice::Registered => "Registration successful! Please log in.",
            Notice::LoggedOut => "You have been logged out.",
            Notice::NewChatFailed => "Failed to create new chat.",
            Notice::ChatNotFound => "Chat not found.",
        }
    }
}
