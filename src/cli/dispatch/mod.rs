//! Command-line argument dispatch.
//!
//! Maps validated CLI matches onto the server action and its configuration.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result, bail};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or out of range.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let access_signing_key = matches
        .get_one::<String>("access-signing-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --access-signing-key")?;
    let admin_signing_key = matches
        .get_one::<String>("admin-signing-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --admin-signing-key")?;

    let access_token_ttl_minutes = matches
        .get_one::<i64>("access-token-ttl-minutes")
        .copied()
        .unwrap_or(60);
    if access_token_ttl_minutes <= 0 {
        bail!("--access-token-ttl-minutes must be positive");
    }

    let refresh_token_ttl_days = matches
        .get_one::<i64>("refresh-token-ttl-days")
        .copied()
        .unwrap_or(7);
    if refresh_token_ttl_days <= 0 {
        bail!("--refresh-token-ttl-days must be positive");
    }

    let login_rate_limit = matches
        .get_one::<u32>("login-rate-limit")
        .copied()
        .unwrap_or(5);
    let login_rate_window_seconds = matches
        .get_one::<u64>("login-rate-window-seconds")
        .copied()
        .unwrap_or(60);
    let refresh_rate_limit = matches
        .get_one::<u32>("refresh-rate-limit")
        .copied()
        .unwrap_or(10);
    let refresh_rate_window_seconds = matches
        .get_one::<u64>("refresh-rate-window-seconds")
        .copied()
        .unwrap_or(60);
    if login_rate_window_seconds == 0 || refresh_rate_window_seconds == 0 {
        bail!("rate limit windows must be at least one second");
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        access_signing_key,
        admin_signing_key,
        token_issuer: matches.get_one::<String>("token-issuer").cloned(),
        token_audience: matches.get_one::<String>("token-audience").cloned(),
        access_token_ttl_minutes,
        refresh_token_ttl_days,
        login_rate_limit,
        login_rate_window_seconds,
        refresh_rate_limit,
        refresh_rate_window_seconds,
    }))
}
