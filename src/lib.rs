//! # SkillXchange backend
//!
//! HTTP backend for a skill-exchange marketplace. Users offer and seek
//! skills, request connections ("exchanges") with each other, negotiate the
//! exchange lifecycle, and message each other about a connection.
//!
//! ## Authentication
//!
//! Authentication is session based: signin issues an opaque high-entropy
//! token, delivered in an `HttpOnly` cookie and accepted as a bearer token.
//! Only the SHA-256 hash of the token is stored. Sessions expire after a
//! configurable lifetime and the token is rotated on a fixed cadence while a
//! session stays active. Signup and signin are guarded by a per-IP request
//! limiter and a per-email login lockout backed by the `login_attempts`
//! audit table.
//!
//! ## Exchange lifecycle
//!
//! - **States:** `pending → {accepted, rejected, cancelled}`,
//!   `accepted → {in_progress, cancelled}`, `in_progress → {completed,
//!   cancelled}`; `rejected`, `completed` and `cancelled` are terminal.
//! - **Authorization:** only the provider may accept or reject a request;
//!   every other mutation requires being one of the two parties.
//! - **Pair uniqueness:** at most one active exchange (pending, accepted or
//!   in_progress) may exist per unordered user pair, enforced by a partial
//!   unique index so concurrent requests cannot create duplicates.
//!
//! Notifications are emitted as a side effect of exchange transitions and
//! message sends; a notification failure never fails the primary operation.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
