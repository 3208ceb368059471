//! Auth handlers and supporting modules.
//!
//! This module coordinates account signup, credential signin, session
//! introspection, and logout. Sessions are opaque bearer tokens stored
//! hashed in Postgres and delivered as `HttpOnly` cookies, with a
//! readable CSRF companion cookie for the frontend.
//!
//! ## Login Lockout
//!
//! Failed signin attempts are recorded per email. Once the attempt limit is
//! reached within the lockout window the email is locked out until the window
//! expires. If the attempt store is unreachable, signin fails closed.
//!
//! ## Request Rate Limiting
//!
//! Signup and signin are additionally rate-limited per client IP with a fixed
//! window counter, independent of credential validity.

mod login_rate_limit;
mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod session;
pub(crate) mod signin;
pub(crate) mod signup;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use rate_limit::{FixedWindowLimiter, NoopRateLimiter, RateLimiter};
pub use state::{AuthConfig, AuthState};
pub(crate) use utils::{generate_token, hash_token, is_unique_violation};

#[cfg(test)]
mod tests;
