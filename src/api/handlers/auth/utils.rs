//! Small helpers shared by the auth handlers.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use std::net::SocketAddr;

/// Usernames are 2 to 50 word characters.
pub(super) fn valid_username(username: &str) -> bool {
    Regex::new(r"^\w{2,50}$").is_ok_and(|regex| regex.is_match(username))
}

/// Basic email format check.
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Passwords need at least six characters with one digit, one lowercase and
/// one uppercase letter.
pub(super) fn valid_password(password: &str) -> bool {
    password.len() >= 6
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
}

/// Create the opaque value for a refresh-token record: 32 bytes of OS
/// randomness, base64url. Never derived from user data.
pub(super) fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Resolve the client IP for rate limiting: proxy headers first, then the
/// socket peer address.
pub(super) fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.ip().to_string()
}
