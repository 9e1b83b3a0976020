use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_AUTH_SECRET: &str = "auth-secret";
pub const ARG_POLKA_KEY: &str = "polka-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_CONCEAL_UNKNOWN_EMAIL: &str = "conceal-unknown-email";

/// Upper bound for either token lifetime: ten years.
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Options {
    pub auth_secret: SecretString,
    pub polka_key: Option<SecretString>,
    pub session_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub conceal_unknown_email: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let auth_secret = matches
            .get_one::<String>(ARG_AUTH_SECRET)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_AUTH_SECRET}"))?;

        let polka_key = matches
            .get_one::<String>(ARG_POLKA_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()));

        Ok(Self {
            auth_secret,
            polka_key,
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            refresh_token_ttl_seconds: matches
                .get_one::<u64>(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(5_184_000),
            conceal_unknown_email: matches.get_flag(ARG_CONCEAL_UNKNOWN_EMAIL),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_SECRET)
                .long(ARG_AUTH_SECRET)
                .help("Secret used to sign session tokens")
                .env("CHIRPY_AUTH_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_POLKA_KEY)
                .long(ARG_POLKA_KEY)
                .help("API key expected on payment provider webhooks")
                .env("CHIRPY_POLKA_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Default and maximum session token lifetime in seconds")
                .env("CHIRPY_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("CHIRPY_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("5184000")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CONCEAL_UNKNOWN_EMAIL)
                .long(ARG_CONCEAL_UNKNOWN_EMAIL)
                .help("Answer logins for unknown emails with 401 instead of 404")
                .env("CHIRPY_CONCEAL_UNKNOWN_EMAIL")
                .action(ArgAction::SetTrue),
        )
}
