//! Auth state and security configuration.

use std::sync::Arc;

use super::rate_limit::RateLimiter;

const DEFAULT_SESSION_LIFETIME_SECONDS: i64 = 2 * 60 * 60;
const DEFAULT_SESSION_REGENERATE_SECONDS: i64 = 10 * 60;
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
const DEFAULT_MAX_LOGIN_ATTEMPTS: i64 = 5;
const DEFAULT_LOGIN_LOCKOUT_SECONDS: i64 = 15 * 60;
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_CSRF_TOKEN_LENGTH: usize = 32;
const DEFAULT_CSRF_TOKEN_EXPIRY_SECONDS: i64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_lifetime_seconds: i64,
    session_regenerate_seconds: i64,
    secure_cookies: bool,
    password_min_length: usize,
    max_login_attempts: i64,
    login_lockout_seconds: i64,
    rate_limit_requests: u32,
    rate_limit_window_seconds: u64,
    csrf_token_length: usize,
    csrf_token_expiry_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_lifetime_seconds: DEFAULT_SESSION_LIFETIME_SECONDS,
            session_regenerate_seconds: DEFAULT_SESSION_REGENERATE_SECONDS,
            secure_cookies: false,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            login_lockout_seconds: DEFAULT_LOGIN_LOCKOUT_SECONDS,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            csrf_token_length: DEFAULT_CSRF_TOKEN_LENGTH,
            csrf_token_expiry_seconds: DEFAULT_CSRF_TOKEN_EXPIRY_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_lifetime_seconds(mut self, seconds: i64) -> Self {
        self.session_lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_regenerate_seconds(mut self, seconds: i64) -> Self {
        self.session_regenerate_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_password_min_length(mut self, length: usize) -> Self {
        self.password_min_length = length;
        self
    }

    #[must_use]
    pub fn with_max_login_attempts(mut self, attempts: i64) -> Self {
        self.max_login_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_login_lockout_seconds(mut self, seconds: i64) -> Self {
        self.login_lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_requests(mut self, requests: u32) -> Self {
        self.rate_limit_requests = requests;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_csrf_token_length(mut self, length: usize) -> Self {
        self.csrf_token_length = length;
        self
    }

    #[must_use]
    pub fn with_csrf_token_expiry_seconds(mut self, seconds: i64) -> Self {
        self.csrf_token_expiry_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn session_lifetime_seconds(&self) -> i64 {
        self.session_lifetime_seconds
    }

    pub(super) fn session_regenerate_seconds(&self) -> i64 {
        self.session_regenerate_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        // An https frontend implies secure cookies even without the flag.
        self.secure_cookies || self.frontend_base_url.starts_with("https://")
    }

    pub(super) fn password_min_length(&self) -> usize {
        self.password_min_length
    }

    pub(super) fn max_login_attempts(&self) -> i64 {
        self.max_login_attempts
    }

    pub(super) fn login_lockout_seconds(&self) -> i64 {
        self.login_lockout_seconds
    }

    pub(crate) fn rate_limit_requests(&self) -> u32 {
        self.rate_limit_requests
    }

    pub(crate) fn rate_limit_window_seconds(&self) -> u64 {
        self.rate_limit_window_seconds
    }

    pub(super) fn csrf_token_length(&self) -> usize {
        self.csrf_token_length
    }

    pub(super) fn csrf_token_expiry_seconds(&self) -> i64 {
        self.csrf_token_expiry_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
