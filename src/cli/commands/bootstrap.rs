use crate::auth::utils::{normalize_email, valid_email, valid_username};
use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ADMIN_USERNAME: &str = "admin-username";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";

/// Administrator ensured at startup.
#[derive(Debug, Clone)]
pub struct Options {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

impl Options {
    /// `None` when no bootstrap argument is set.
    ///
    /// # Errors
    /// Returns an error when only some of the three arguments are set, or when the
    /// username or email would be rejected at registration.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        match (
            get_non_empty(ARG_ADMIN_USERNAME),
            get_non_empty(ARG_ADMIN_EMAIL),
            get_non_empty(ARG_ADMIN_PASSWORD),
        ) {
            (None, None, None) => Ok(None),
            (Some(username), Some(email), Some(password)) => {
                let username = username.trim().to_string();
                if !valid_username(&username) {
                    bail!(
                        "--{ARG_ADMIN_USERNAME} must be 3 to 50 characters without '@' or whitespace"
                    );
                }
                let email = normalize_email(&email);
                if !valid_email(&email) {
                    bail!("--{ARG_ADMIN_EMAIL} is not a valid email address");
                }
                Ok(Some(Self {
                    username,
                    email,
                    password: SecretString::from(password),
                }))
            }
            _ => bail!(
                "--{ARG_ADMIN_USERNAME}, --{ARG_ADMIN_EMAIL} and --{ARG_ADMIN_PASSWORD} must be set together"
            ),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_USERNAME)
                .long(ARG_ADMIN_USERNAME)
                .help("Username of the administrator created at startup if missing")
                .env("TASKMASTER_ADMIN_USERNAME"),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of the bootstrap administrator")
                .env("TASKMASTER_ADMIN_EMAIL"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password of the bootstrap administrator")
                .env("TASKMASTER_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}
