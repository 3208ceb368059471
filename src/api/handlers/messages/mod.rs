//! Direct messaging endpoints.
//!
//! Messages are plain two-party rows; a conversation is derived, not stored.
//! History fetches return both directions oldest first, sends notify the
//! receiver with a preview, and read state flips in bulk per peer. The
//! conversations view folds each peer down to the latest message plus an
//! unread tally so the inbox needs a single query.

pub(crate) mod chat;
pub(crate) mod conversations;
mod storage;
mod types;
