use crate::auth::AuthConfig;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_SECRET: &str = "signing-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_STRICT_SIGNING_SECRET: &str = "strict-signing-secret";

/// Build the token settings from matches. Empty secrets count as missing.
#[must_use]
pub fn parse(matches: &ArgMatches) -> AuthConfig {
    let secret = matches
        .get_one::<String>(ARG_SIGNING_SECRET)
        .filter(|value| !value.is_empty())
        .map(|value| SecretString::from(value.clone()));

    let mut config = AuthConfig::new()
        .with_signing_secret(secret)
        .with_strict_signing_secret(matches.get_flag(ARG_STRICT_SIGNING_SECRET));
    if let Some(ttl) = matches.get_one::<i64>(ARG_TOKEN_TTL_SECONDS) {
        config = config.with_token_ttl_seconds(*ttl);
    }
    config
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_SECRET)
                .long(ARG_SIGNING_SECRET)
                .help("HMAC-SHA-512 token signing secret (at least 64 bytes)")
                .long_help(
                    "HMAC-SHA-512 token signing secret, at least 64 bytes.\n\nWhen missing or shorter, a random key is generated for the lifetime of the process: tokens do not survive a restart and are rejected by other instances.",
                )
                .env("TASKMASTER_SIGNING_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("TASKMASTER_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_STRICT_SIGNING_SECRET)
                .long(ARG_STRICT_SIGNING_SECRET)
                .help("Fail at startup instead of generating a random signing key")
                .env("TASKMASTER_STRICT_SIGNING_SECRET")
                .action(ArgAction::SetTrue),
        )
}
