//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::security;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let security_opts = security::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: security_opts.frontend_base_url,
        session_lifetime_seconds: security_opts.session_lifetime_seconds,
        session_regenerate_seconds: security_opts.session_regenerate_seconds,
        secure_cookies: security_opts.secure_cookies,
        password_min_length: security_opts.password_min_length,
        max_login_attempts: security_opts.max_login_attempts,
        login_lockout_seconds: security_opts.login_lockout_seconds,
        rate_limit_requests: security_opts.rate_limit_requests,
        rate_limit_window_seconds: security_opts.rate_limit_window_seconds,
        csrf_token_length: security_opts.csrf_token_length,
        csrf_token_expiry_seconds: security_opts.csrf_token_expiry_seconds,
    }))
}
