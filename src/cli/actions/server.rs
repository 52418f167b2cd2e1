use crate::api::{self, handlers::auth};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_signing_key: SecretString,
    pub admin_signing_key: SecretString,
    pub token_issuer: Option<String>,
    pub token_audience: Option<String>,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub login_rate_limit: u32,
    pub login_rate_window_seconds: u64,
    pub refresh_rate_limit: u32,
    pub refresh_rate_window_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing keys are unusable, the DSN is malformed,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    // Key problems are fatal before the listener ever opens.
    let keys = auth::KeyRegistry::new(args.access_signing_key, args.admin_signing_key)
        .context("Invalid signing key configuration")?;

    let dsn = Url::parse(&args.dsn).context("Invalid database DSN")?;

    let auth_config = auth::AuthConfig::new()
        .with_access_token_ttl_minutes(args.access_token_ttl_minutes)
        .with_refresh_token_ttl_days(args.refresh_token_ttl_days)
        .with_issuer(args.token_issuer)
        .with_audience(args.token_audience);

    let rate_limiter = auth::FixedWindowRateLimiter::new(
        auth::WindowPolicy::new(
            args.login_rate_limit,
            Duration::from_secs(args.login_rate_window_seconds),
        ),
        auth::WindowPolicy::new(
            args.refresh_rate_limit,
            Duration::from_secs(args.refresh_rate_window_seconds),
        ),
    );

    let auth_state = Arc::new(auth::AuthState::new(
        auth_config,
        keys,
        Arc::new(rate_limiter),
    )?);

    api::new(args.port, dsn.to_string(), auth_state).await
}
