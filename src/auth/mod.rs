//! Authentication and authorization core.
//!
//! - [`password`] hashes and verifies credentials with Argon2id.
//! - [`token`] mints and verifies HS512 access tokens.
//! - [`authenticator`] implements registration and login on top of both.
//! - [`guard`] turns a bearer token into a [`Principal`] for every protected request.
//! - [`policy`] decides whether a principal may act on a resource.

pub mod authenticator;
pub mod config;
pub mod guard;
pub mod password;
pub mod policy;
pub mod token;
pub mod utils;

pub use authenticator::{AuthError, Authenticated, Authenticator, Registration};
pub use config::AuthConfig;
pub use guard::{AccessGuard, GuardError, Principal, require_auth};
pub use password::{HashError, PasswordHasher};
pub use policy::{Decision, Operation, Owned, authorize, can_assign_roles, decide};
pub use token::{Claims, KeyError, KeySource, SigningKey, TokenCodec, TokenError};

/// Current time as Unix seconds.
#[must_use]
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
