//! # TaskMaster (task tracking API)
//!
//! `taskmaster` is a small task tracking service. Authenticated users own tasks
//! (title, description, due date, priority, completion state) and administrators
//! manage every user and task.
//!
//! ## Authentication
//!
//! Login and registration are the only operations that mint access tokens. A token
//! is a compact `header.payload.signature` string signed with HMAC-SHA-512 using a
//! single process-wide key. Tokens are not stored server side; every protected
//! request presents one as `Authorization: Bearer <token>`.
//!
//! The access guard verifies the token and then resolves its subject against the
//! credential store, so tokens issued to accounts that were deleted afterwards stop
//! working immediately.
//!
//! > **Warning:** when no signing secret (or one shorter than 64 bytes) is configured
//! > the process signs with a random in-memory key. Tokens then become invalid on
//! > restart and are not portable between instances.
//!
//! ## Authorization
//!
//! - **Admin override:** `ADMIN` may read, update and delete every resource.
//! - **Ownership:** everyone else may only touch tasks they own and their own user record.
//! - **Role assignment** is restricted to `ADMIN`.
//!
//! Denied access to a particular task or user returns `404 Not Found` rather than
//! `403 Forbidden` so identifiers cannot be probed. Admin-only listings return `403`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod model;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
