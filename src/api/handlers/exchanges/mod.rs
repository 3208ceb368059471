//! Exchange (connection) endpoints.
//!
//! An exchange links a requester to a provider for one requested skill and
//! moves through a fixed status graph: `pending` is answered by the provider
//! (`accepted` or `rejected`) or withdrawn by the requester (`cancelled`);
//! `accepted` work moves to `in_progress` and then `completed`; either party
//! can cancel before completion. `rejected`, `completed`, and `cancelled` are
//! terminal. At most one active exchange exists per user pair, enforced by a
//! partial unique index so concurrent creates converge on a single row.
//!
//! The handler modules parse inputs and map the flow while `storage` owns the
//! SQL. Status writes are compare-and-set against the status the caller read,
//! so stale updates surface as 409 instead of silently clobbering.
//!
//! Flow Overview:
//! 1) Authenticate via session cookie.
//! 2) Validate input shape, then resolve the exchange row.
//! 3) Enforce party membership and provider-only transitions.
//! 4) Check the transition graph, then write with a status guard.

pub(crate) mod connections;
pub(crate) mod lifecycle;
mod status;
mod storage;
mod types;
