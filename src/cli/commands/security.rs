//! Session, lockout, and rate-limit arguments.
//!
//! Every knob the hardening layer consumes is defined here so it can be tuned
//! from the environment without code changes.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_guard_args(command);
    with_csrf_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL allowed for CORS with credentials")
                .env("SKILLXCHANGE_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new("session-lifetime-seconds")
                .long("session-lifetime-seconds")
                .help("Session lifetime in seconds")
                .env("SKILLXCHANGE_SESSION_LIFETIME_SECONDS")
                .default_value("7200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-regenerate-seconds")
                .long("session-regenerate-seconds")
                .help("Interval between session token rotations in seconds")
                .env("SKILLXCHANGE_SESSION_REGENERATE_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("secure-cookies")
                .long("secure-cookies")
                .help("Mark session cookies as Secure (HTTPS-only deployments)")
                .env("SKILLXCHANGE_SECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}

fn with_guard_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("password-min-length")
                .long("password-min-length")
                .help("Minimum accepted password length")
                .env("SKILLXCHANGE_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-login-attempts")
                .long("max-login-attempts")
                .help("Failed signins per email before lockout")
                .env("SKILLXCHANGE_MAX_LOGIN_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("login-lockout-seconds")
                .long("login-lockout-seconds")
                .help("Lockout window for failed signins in seconds")
                .env("SKILLXCHANGE_LOGIN_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("rate-limit-requests")
                .long("rate-limit-requests")
                .help("Requests allowed per window per client and action")
                .env("SKILLXCHANGE_RATE_LIMIT_REQUESTS")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("rate-limit-window-seconds")
                .long("rate-limit-window-seconds")
                .help("Rate limit window in seconds")
                .env("SKILLXCHANGE_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_csrf_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("csrf-token-length")
                .long("csrf-token-length")
                .help("CSRF companion token length in bytes")
                .env("SKILLXCHANGE_CSRF_TOKEN_LENGTH")
                .default_value("32")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("csrf-token-expiry-seconds")
                .long("csrf-token-expiry-seconds")
                .help("CSRF companion cookie lifetime in seconds")
                .env("SKILLXCHANGE_CSRF_TOKEN_EXPIRY_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_lifetime_seconds: i64,
    pub session_regenerate_seconds: i64,
    pub secure_cookies: bool,
    pub password_min_length: usize,
    pub max_login_attempts: i64,
    pub login_lockout_seconds: i64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub csrf_token_length: usize,
    pub csrf_token_expiry_seconds: i64,
}

impl Options {
    /// Extract the security options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            session_lifetime_seconds: matches
                .get_one::<i64>("session-lifetime-seconds")
                .copied()
                .context("missing required argument: --session-lifetime-seconds")?,
            session_regenerate_seconds: matches
                .get_one::<i64>("session-regenerate-seconds")
                .copied()
                .context("missing required argument: --session-regenerate-seconds")?,
            secure_cookies: matches.get_flag("secure-cookies"),
            password_min_length: matches
                .get_one::<usize>("password-min-length")
                .copied()
                .context("missing required argument: --password-min-length")?,
            max_login_attempts: matches
                .get_one::<i64>("max-login-attempts")
                .copied()
                .context("missing required argument: --max-login-attempts")?,
            login_lockout_seconds: matches
                .get_one::<i64>("login-lockout-seconds")
                .copied()
                .context("missing required argument: --login-lockout-seconds")?,
            rate_limit_requests: matches
                .get_one::<u32>("rate-limit-requests")
                .copied()
                .context("missing required argument: --rate-limit-requests")?,
            rate_limit_window_seconds: matches
                .get_one::<u64>("rate-limit-window-seconds")
                .copied()
                .context("missing required argument: --rate-limit-window-seconds")?,
            csrf_token_length: matches
                .get_one::<usize>("csrf-token-length")
                .copied()
                .context("missing required argument: --csrf-token-length")?,
            csrf_token_expiry_seconds: matches
                .get_one::<i64>("csrf-token-expiry-seconds")
                .copied()
                .context("missing required argument: --csrf-token-expiry-seconds")?,
        })
    }
}
